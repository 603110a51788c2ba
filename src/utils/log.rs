// src/utils/log.rs

//! Bounded append-only log channel with server-style formatting.
//!
//! The crawl task writes into a [`LogChannel`]; any number of readers drain it
//! with their own [`LogCursor`]. When the buffer is full the oldest lines are
//! evicted and readers that fell behind are told how many they missed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// A single line in the channel.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// Monotonic sequence number, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

/// Read position of one consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    /// Sequence number of the next line to read
    pub next: u64,
    /// Total lines evicted before this consumer could read them
    pub missed: u64,
}

#[derive(Debug)]
struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
    next_seq: u64,
    min_level: LogLevel,
}

/// Cloneable handle to a shared, bounded log buffer.
#[derive(Debug, Clone)]
pub struct LogChannel {
    inner: Arc<Mutex<LogBuffer>>,
}

impl LogChannel {
    /// Create a channel keeping at most `capacity` lines at or above `min_level`.
    pub fn new(capacity: usize, min_level: LogLevel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogBuffer {
                lines: VecDeque::with_capacity(capacity.min(4096)),
                capacity: capacity.max(1),
                next_seq: 0,
                min_level,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogBuffer> {
        // A panicking writer cannot leave the ring half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let mut buf = self.lock();
        if level < buf.min_level {
            return;
        }
        let seq = buf.next_seq;
        buf.next_seq += 1;
        buf.lines.push_back(LogLine {
            seq,
            timestamp: Local::now(),
            level,
            message: message.into(),
        });
        while buf.lines.len() > buf.capacity {
            buf.lines.pop_front();
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Return every retained line appended since `cursor`, advancing it.
    pub fn read(&self, cursor: &mut LogCursor) -> Vec<LogLine> {
        let buf = self.lock();
        let oldest = buf.lines.front().map_or(buf.next_seq, |l| l.seq);
        if cursor.next < oldest {
            cursor.missed += oldest - cursor.next;
            cursor.next = oldest;
        }
        let lines: Vec<LogLine> = buf
            .lines
            .iter()
            .filter(|l| l.seq >= cursor.next)
            .cloned()
            .collect();
        cursor.next = buf.next_seq;
        lines
    }

    /// Number of lines currently retained.
    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new(1000, LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from_str("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_independent_cursors() {
        let logs = LogChannel::new(10, LogLevel::Debug);
        let mut a = LogCursor::default();
        let mut b = LogCursor::default();

        logs.info("one");
        logs.info("two");
        assert_eq!(logs.read(&mut a).len(), 2);

        logs.warn("three");
        let lines = logs.read(&mut a);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "three");

        // b has not read anything yet
        assert_eq!(logs.read(&mut b).len(), 3);
        assert!(logs.read(&mut b).is_empty());
    }

    #[test]
    fn test_eviction_counts_missed_lines() {
        let logs = LogChannel::new(2, LogLevel::Debug);
        let mut cursor = LogCursor::default();
        for i in 0..5 {
            logs.info(format!("line {i}"));
        }
        let lines = logs.read(&mut cursor);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "line 3");
        assert_eq!(cursor.missed, 3);
        assert_eq!(cursor.next, 5);
    }

    #[test]
    fn test_min_level_filters() {
        let logs = LogChannel::new(10, LogLevel::Warn);
        logs.debug("hidden");
        logs.info("hidden");
        logs.error("shown");
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_line_format() {
        let logs = LogChannel::new(10, LogLevel::Info);
        logs.warn("retrying");
        let line = logs.read(&mut LogCursor::default()).remove(0);
        assert!(line.to_string().ends_with("[WARN] retrying"));
    }
}
