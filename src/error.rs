// src/error.rs

//! Unified error handling for the ranking crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pre-flight validation failed (e.g. start page does not exist)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/API failure while fetching a page, document or comment
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Malformed timestamp on a document or comment
    #[error("Cannot parse timestamp '{value}': {message}")]
    TimeParse { value: String, message: String },

    /// Snapshot or report input missing or malformed
    #[error("Data file error: {0}")]
    DataFile(String),

    /// A crawl is already running in the background
    #[error("A crawl is already running")]
    AlreadyRunning,

    /// The background crawl task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a timestamp parse error.
    pub fn time_parse(value: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::TimeParse {
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Create a data file error.
    pub fn data_file(message: impl Into<String>) -> Self {
        Self::DataFile(message.into())
    }

    /// Errors that repeat identically on every attempt, so retrying is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Url(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = AppError::fetch("post 42", "connection reset");
        assert_eq!(err.to_string(), "Fetch error for post 42: connection reset");
    }

    #[test]
    fn test_time_parse_display() {
        let err = AppError::time_parse("yesterday", "unknown format");
        assert!(err.to_string().contains("'yesterday'"));
    }
}
