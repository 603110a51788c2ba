//! Utility functions and helpers.

pub mod log;

pub use self::log::{LogChannel, LogCursor, LogLevel, LogLine};
