//! Service layer for the ranking crawler.
//!
//! This module contains:
//! - Board access (`BoardSource`, `HttpBoardSource`)
//! - Retry around board access (`RetryingFetcher`)
//! - Post identity hashing (`identify`)

pub mod board;
pub mod fetcher;
pub mod identity;

pub use board::{BoardSource, CommentStream, HttpBoardSource, validate_start_page};
pub use fetcher::{RetryPolicy, RetryingFetcher};
pub use identity::identify;
