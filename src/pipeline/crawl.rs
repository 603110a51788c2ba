// src/pipeline/crawl.rs

//! Page-by-page crawl loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{BoardRef, Config, CrawlState, TimeWindow};
use crate::pipeline::process::{PostProcessor, Verdict};
use crate::pipeline::status::{CrawlMonitor, CrawlPhase, CrawlStatus};
use crate::services::RetryingFetcher;
use crate::storage::SnapshotStorage;

/// Parameters of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub board: BoardRef,
    pub start_page: u32,
    pub window: TimeWindow,
    /// Consecutive `Old` verdicts that end the crawl
    pub old_streak_threshold: u32,
    pub checkpoint_every: u64,
    /// Pause between listing pages
    pub page_delay: Duration,
}

impl CrawlJob {
    /// Build a job from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            board: config.board.board_ref(),
            start_page: config.board.start_page,
            window: config.window.to_window()?,
            old_streak_threshold: config.crawler.old_streak_threshold.max(1),
            checkpoint_every: config.crawler.checkpoint_every,
            page_delay: Duration::from_millis(config.crawler.request_delay_ms),
        })
    }
}

/// Why the crawl loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ran past the last listing page
    EndOfBoard,
    /// A listing page could not be fetched
    PageUnavailable,
    /// Enough consecutive posts were older than the window
    OldStreak,
    Cancelled,
}

/// Summary of a finished crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub stop_reason: StopReason,
    pub pages_visited: u32,
    pub posts_seen: u64,
    pub accepted: u64,
    pub authors: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// No post was accepted and the one-day fallback window was used
    pub fallback_window: bool,
}

/// Crawl `job.board` from `job.start_page` until the board ends, an old
/// streak is hit, or `cancel` fires. The final snapshot is always written.
///
/// Cancellation is checked before every page fetch and before every post; a
/// fetch already in flight runs to completion.
pub async fn run_crawl(
    job: &CrawlJob,
    fetcher: &RetryingFetcher,
    storage: &dyn SnapshotStorage,
    monitor: &CrawlMonitor,
    cancel: &CancellationToken,
) -> Result<CrawlSummary> {
    let logs = monitor.logs();
    let processor = PostProcessor::new(
        fetcher,
        storage,
        job.window,
        job.checkpoint_every,
        logs.clone(),
    );

    let mut state = CrawlState::new();
    let mut status = CrawlStatus {
        phase: CrawlPhase::Crawling,
        page: job.start_page,
        ..CrawlStatus::default()
    };
    monitor.publish(status.clone());

    logs.info(format!(
        "Crawling board {} (minor: {}) from page {} for [{}, {})",
        job.board.id, job.board.minor, job.start_page, job.window.start, job.window.end
    ));

    let mut page = job.start_page;
    let mut pages_visited = 0;
    let mut consecutive_old = 0;

    let stop_reason = 'pages: loop {
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }

        status.page = page;
        monitor.publish(status.clone());

        let Some(posts) = fetcher.fetch_page(&job.board, page).await else {
            break StopReason::PageUnavailable;
        };
        if posts.is_empty() {
            break StopReason::EndOfBoard;
        }
        pages_visited += 1;
        logs.debug(format!("Page {page}: {} posts", posts.len()));

        for post in &posts {
            if cancel.is_cancelled() {
                break 'pages StopReason::Cancelled;
            }

            let verdict = processor.process(post, &mut state).await;
            status.posts_seen += 1;

            if verdict == Verdict::Old {
                consecutive_old += 1;
            } else {
                consecutive_old = 0;
            }

            status.accepted = state.global_count;
            status.authors = state.rank.len();
            status.consecutive_old = consecutive_old;
            monitor.publish(status.clone());

            if consecutive_old >= job.old_streak_threshold {
                logs.info(format!(
                    "{consecutive_old} consecutive posts before the window; stopping"
                ));
                break 'pages StopReason::OldStreak;
            }
        }

        page += 1;
        if !job.page_delay.is_zero() {
            tokio::time::sleep(job.page_delay).await;
        }
    };

    let fallback_window = state.ensure_window(Utc::now());
    if fallback_window {
        logs.warn("No post was accepted; using a one-day fallback window");
    }

    let saved = storage.save_snapshot(&state).await;
    status.phase = match (&saved, stop_reason) {
        (Err(_), _) => CrawlPhase::Failed,
        (Ok(()), StopReason::Cancelled) => CrawlPhase::Cancelled,
        (Ok(()), _) => CrawlPhase::Finished,
    };
    monitor.publish(status.clone());
    if let Err(e) = saved {
        logs.error(format!("Final snapshot failed: {e}"));
        return Err(e);
    }

    let (window_start, window_end) = state.report_window();
    logs.info(format!(
        "Crawl stopped ({stop_reason:?}): {} accepted of {} posts, {} authors, window {window_start} ~ {window_end}",
        state.global_count,
        status.posts_seen,
        state.rank.len()
    ));

    Ok(CrawlSummary {
        stop_reason,
        pages_visited,
        posts_seen: status.posts_seen,
        accepted: state.global_count,
        authors: state.rank.len(),
        window_start,
        window_end,
        fallback_window,
    })
}
