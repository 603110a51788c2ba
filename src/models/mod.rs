// src/models/mod.rs

//! Domain models for the ranking crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod post;
mod rank;
pub mod snapshot;
mod state;

// Re-export all public types
pub use config::{
    BoardConfig, Config, CrawlerConfig, LoggingConfig, PathsConfig, ReportConfig, ReportFormat,
    WindowConfig,
};
pub use post::{
    BoardRef, CommentKey, CommentRecord, PostRecord, PostRef, author_key, normalize_time,
};
pub use rank::{RankEntry, RankTable};
pub use state::{CrawlState, TimeWindow, WindowPosition};
