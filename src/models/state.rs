//! Crawl window and mutable crawl state.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RankTable;

/// Half-open time range `[start, end)` of posts to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Where a timestamp falls relative to a [`TimeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    Before,
    Within,
    After,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(AppError::validation(format!(
                "window start {start} is not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn position(&self, t: DateTime<Utc>) -> WindowPosition {
        if t >= self.end {
            WindowPosition::After
        } else if t < self.start {
            WindowPosition::Before
        } else {
            WindowPosition::Within
        }
    }
}

/// Everything a crawl accumulates. Owned by one crawl loop at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Earliest accepted post time
    pub start_date: Option<DateTime<Utc>>,

    /// Latest accepted post time
    pub end_date: Option<DateTime<Utc>>,

    /// Run creation time
    pub date: DateTime<Utc>,

    /// Accepted post counter
    pub global_count: u64,

    pub start_time: DateTime<Utc>,

    pub rank: RankTable,

    /// Unique ids of every post seen this run
    #[serde(default)]
    pub seen_posts: BTreeSet<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            start_date: None,
            end_date: None,
            date: now,
            global_count: 0,
            start_time: now,
            rank: RankTable::new(),
            seen_posts: BTreeSet::new(),
        }
    }

    /// Widen the observed window to include `t`.
    pub fn observe(&mut self, t: DateTime<Utc>) {
        if self.start_date.is_none_or(|s| t < s) {
            self.start_date = Some(t);
        }
        if self.end_date.is_none_or(|e| t > e) {
            self.end_date = Some(t);
        }
    }

    /// Use a one-day window ending at `now` if nothing was accepted.
    ///
    /// Returns true when the fallback was applied.
    pub fn ensure_window(&mut self, now: DateTime<Utc>) -> bool {
        if self.start_date.is_some() {
            return false;
        }
        self.start_date = Some(now - Duration::days(1));
        self.end_date = Some(now);
        true
    }

    /// Observed window, or `[date - 1 day, date]` when none was recorded.
    pub fn report_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => (self.date - Duration::days(1), self.date),
        }
    }

    /// Minutes since the run started.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time).num_milliseconds() as f64 / 60_000.0
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}
