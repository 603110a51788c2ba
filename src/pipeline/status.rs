//! Progress status shared between the crawl task and its observers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::utils::LogChannel;

/// Lifecycle phase of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlPhase {
    #[default]
    Idle,
    Crawling,
    Finished,
    Cancelled,
    Failed,
}

/// Latest progress of a crawl. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatus {
    pub phase: CrawlPhase,
    pub page: u32,
    pub posts_seen: u64,
    pub accepted: u64,
    pub authors: usize,
    pub consecutive_old: u32,
}

/// Reporting handle given to the crawl task: a log channel plus a status slot.
#[derive(Debug, Clone)]
pub struct CrawlMonitor {
    logs: LogChannel,
    status: Arc<watch::Sender<CrawlStatus>>,
}

impl CrawlMonitor {
    pub fn new(logs: LogChannel) -> Self {
        let (status, _) = watch::channel(CrawlStatus::default());
        Self {
            logs,
            status: Arc::new(status),
        }
    }

    pub fn logs(&self) -> &LogChannel {
        &self.logs
    }

    /// Replace the published status.
    pub fn publish(&self, status: CrawlStatus) {
        self.status.send_replace(status);
    }

    pub fn subscribe(&self) -> watch::Receiver<CrawlStatus> {
        self.status.subscribe()
    }

    pub fn current(&self) -> CrawlStatus {
        self.status.borrow().clone()
    }
}

impl Default for CrawlMonitor {
    fn default() -> Self {
        Self::new(LogChannel::default())
    }
}
