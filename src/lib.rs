// src/lib.rs

//! Board crawler and author activity ranking library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
