//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{BoardRef, TimeWindow};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP, retry and crawl-loop settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Board to crawl
    #[serde(default)]
    pub board: BoardConfig,

    /// Time window of posts to count
    #[serde(default)]
    pub window: WindowConfig,

    /// Output file locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Report rendering options
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.crawler.old_streak_threshold == 0 {
            return Err(AppError::validation(
                "crawler.old_streak_threshold must be > 0",
            ));
        }
        if self.crawler.checkpoint_every == 0 {
            return Err(AppError::validation("crawler.checkpoint_every must be > 0"));
        }
        url::Url::parse(&self.crawler.api_base_url)?;
        if self.board.id.trim().is_empty() {
            return Err(AppError::validation("board.id is empty"));
        }
        if self.logging.buffer_capacity == 0 {
            return Err(AppError::validation("logging.buffer_capacity must be > 0"));
        }
        self.window.to_window()?;
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the board API
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per document or comment stream
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay; attempt `n` waits `base * 2^n`
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Consecutive too-old posts that end the crawl
    #[serde(default = "defaults::old_streak_threshold")]
    pub old_streak_threshold: u32,

    /// Accepted posts between checkpoint snapshots
    #[serde(default = "defaults::checkpoint_every")]
    pub checkpoint_every: u64,

    /// Bounded wait for the start-page check
    #[serde(default = "defaults::page_probe_timeout")]
    pub page_probe_timeout_secs: u64,

    /// Delay between listing page requests in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn page_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.page_probe_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::api_base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            old_streak_threshold: defaults::old_streak_threshold(),
            checkpoint_every: defaults::checkpoint_every(),
            page_probe_timeout_secs: defaults::page_probe_timeout(),
            request_delay_ms: 0,
        }
    }
}

/// Board selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "defaults::board_id")]
    pub id: String,

    /// Minor board variant
    #[serde(default = "defaults::minor")]
    pub minor: bool,

    #[serde(default = "defaults::start_page")]
    pub start_page: u32,
}

impl BoardConfig {
    pub fn board_ref(&self) -> BoardRef {
        BoardRef::new(self.id.clone(), self.minor)
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            id: defaults::board_id(),
            minor: defaults::minor(),
            start_page: defaults::start_page(),
        }
    }
}

/// Time window bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "defaults::window_start")]
    pub start: DateTime<Utc>,

    #[serde(default = "defaults::window_end")]
    pub end: DateTime<Utc>,
}

impl WindowConfig {
    pub fn to_window(&self) -> Result<TimeWindow> {
        TimeWindow::new(self.start, self.end)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: defaults::window_start(),
            end: defaults::window_end(),
        }
    }
}

/// Output file locations, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::snapshot_file")]
    pub snapshot_file: String,

    /// Written regardless of report format
    #[serde(default = "defaults::report_file")]
    pub report_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            snapshot_file: defaults::snapshot_file(),
            report_file: defaults::report_file(),
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Text,
}

impl std::str::FromStr for ReportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            other => Err(AppError::config(format!("unknown report format '{other}'"))),
        }
    }
}

/// Report rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,

    /// Number of distinct ranks to include; all when unset
    #[serde(default)]
    pub top: Option<usize>,

    /// Placeholder nickname that is never listed
    #[serde(default = "defaults::blank_nickname")]
    pub blank_nickname: String,

    /// Suffix marking a display-truncated nickname
    #[serde(default = "defaults::truncation_marker")]
    pub truncation_marker: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            top: None,
            blank_nickname: defaults::blank_nickname(),
            truncation_marker: defaults::truncation_marker(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Lines kept in the crawl log channel
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    /// Foreground status polling interval
    #[serde(default = "defaults::status_poll")]
    pub status_poll_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            buffer_capacity: defaults::buffer_capacity(),
            status_poll_ms: defaults::status_poll(),
        }
    }
}

mod defaults {
    use chrono::{DateTime, TimeZone, Utc};

    // Crawler defaults
    pub fn api_base_url() -> String {
        "http://127.0.0.1:8080/api/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; gallrank/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retry_attempts() -> u32 {
        10
    }
    pub fn retry_base_delay() -> u64 {
        200
    }
    pub fn old_streak_threshold() -> u32 {
        20
    }
    pub fn checkpoint_every() -> u64 {
        50
    }
    pub fn page_probe_timeout() -> u64 {
        10
    }

    // Board defaults
    pub fn board_id() -> String {
        "mokalatte".into()
    }
    pub fn minor() -> bool {
        true
    }
    pub fn start_page() -> u32 {
        1
    }

    // Window defaults
    pub fn window_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }
    pub fn window_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    // Path defaults
    pub fn snapshot_file() -> String {
        "data.json".into()
    }
    pub fn report_file() -> String {
        "result.txt".into()
    }

    // Report defaults
    pub fn blank_nickname() -> String {
        "ㅤ".into()
    }
    pub fn truncation_marker() -> String {
        "..".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn buffer_capacity() -> usize {
        1000
    }
    pub fn status_poll() -> u64 {
        500
    }
}
