// src/pipeline/runner.rs

//! Background crawl controller.
//!
//! At most one crawl task runs at a time. The foreground keeps the runner and
//! observes the task through its [`CrawlMonitor`]; cancellation goes through a
//! [`CancellationToken`] that the crawl loop polls between items.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::pipeline::crawl::{CrawlJob, CrawlSummary, run_crawl};
use crate::pipeline::status::{CrawlMonitor, CrawlPhase, CrawlStatus};
use crate::services::{BoardSource, RetryPolicy, RetryingFetcher, validate_start_page};
use crate::storage::SnapshotStorage;
use crate::utils::LogChannel;

pub struct CrawlRunner {
    source: Arc<dyn BoardSource>,
    storage: Arc<dyn SnapshotStorage>,
    policy: RetryPolicy,
    probe_timeout: Duration,
    monitor: CrawlMonitor,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<CrawlSummary>>>,
}

impl CrawlRunner {
    pub fn new(
        source: Arc<dyn BoardSource>,
        storage: Arc<dyn SnapshotStorage>,
        policy: RetryPolicy,
        probe_timeout: Duration,
        logs: LogChannel,
    ) -> Self {
        Self {
            source,
            storage,
            policy,
            probe_timeout,
            monitor: CrawlMonitor::new(logs),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Whether a crawl task exists and has not finished yet.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Validate the start page, then spawn the crawl in the background.
    ///
    /// Fails with [`AppError::AlreadyRunning`] while a previous crawl is alive,
    /// and with a validation error when the start page does not exist. In
    /// both cases no crawl work is started. The outcome of a finished crawl
    /// that was never joined is logged before it is replaced.
    pub async fn start(&mut self, job: CrawlJob) -> Result<()> {
        if self.is_running() {
            return Err(AppError::AlreadyRunning);
        }

        let logs = self.monitor.logs().clone();
        if let Err(e) =
            validate_start_page(self.source.as_ref(), &job.board, job.start_page, self.probe_timeout)
                .await
        {
            logs.error(format!("Start page check failed: {e}"));
            return Err(e);
        }

        // Not running here, so a leftover handle has already finished.
        if let Some(previous) = self.task.take() {
            match previous.await {
                Ok(Ok(summary)) => logs.info(format!(
                    "Previous crawl finished unjoined ({:?}, {} posts accepted)",
                    summary.stop_reason, summary.accepted
                )),
                Ok(Err(e)) => logs.warn(format!("Previous crawl failed unjoined: {e}")),
                Err(e) => logs.warn(format!("Previous crawl task failed: {e}")),
            }
        }

        self.cancel = CancellationToken::new();
        let fetcher = RetryingFetcher::new(self.source.clone(), self.policy, logs.clone());
        let storage = self.storage.clone();
        let monitor = self.monitor.clone();
        let cancel = self.cancel.clone();

        self.task = Some(tokio::spawn(async move {
            let result = run_crawl(&job, &fetcher, storage.as_ref(), &monitor, &cancel).await;
            if let Err(e) = &result {
                monitor.logs().error(format!("Crawl failed: {e}"));
                monitor.publish(CrawlStatus {
                    phase: CrawlPhase::Failed,
                    ..monitor.current()
                });
            }
            result
        }));
        logs.info("Crawl started");
        Ok(())
    }

    /// Ask the running crawl to stop at its next check point.
    pub fn cancel(&self) {
        if self.is_running() {
            self.monitor.logs().info("Cancellation requested");
        }
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> watch::Receiver<CrawlStatus> {
        self.monitor.subscribe()
    }

    pub fn logs(&self) -> &LogChannel {
        self.monitor.logs()
    }

    /// Wait for the current crawl and return its summary.
    pub async fn join(&mut self) -> Result<CrawlSummary> {
        let task = self
            .task
            .take()
            .ok_or_else(|| AppError::validation("no crawl has been started"))?;
        task.await?
    }
}
