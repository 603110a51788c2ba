// src/services/fetcher.rs

//! Bounded exponential-backoff retry around a [`BoardSource`].

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Result;
use crate::models::{BoardRef, CommentRecord, CrawlerConfig, PostRecord, PostRef};
use crate::services::board::{BoardSource, CommentStream};
use crate::utils::LogChannel;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Wait after the failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(200))
    }
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_base_delay())
    }
}

/// Fetches listing pages, documents and comments with retry.
pub struct RetryingFetcher {
    source: Arc<dyn BoardSource>,
    policy: RetryPolicy,
    logs: LogChannel,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn BoardSource>, policy: RetryPolicy, logs: LogChannel) -> Self {
        Self {
            source,
            policy,
            logs,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch a listing page. `None` once every attempt failed, or at once on a
    /// permanent error.
    pub async fn fetch_page(&self, board: &BoardRef, page: u32) -> Option<Vec<PostRef>> {
        for attempt in 0..self.policy.attempts {
            match self.source.list_page(board, page).await {
                Ok(posts) => return Some(posts),
                Err(e) if e.is_permanent() => {
                    self.logs.error(format!(
                        "Cannot fetch board {} page {}: {}",
                        board.id, page, e
                    ));
                    return None;
                }
                Err(e) => self.logs.warn(format!(
                    "[page retry {}/{}] board {} page {}: {}",
                    attempt + 1,
                    self.policy.attempts,
                    board.id,
                    page,
                    e
                )),
            }
            self.backoff(attempt).await;
        }
        self.logs.error(format!(
            "Giving up on board {} page {} after {} attempts",
            board.id, page, self.policy.attempts
        ));
        None
    }

    /// Fetch a document. An absent document counts as a failed attempt; a
    /// permanent error is not retried.
    pub async fn fetch_document(&self, post: &PostRef) -> Option<PostRecord> {
        for attempt in 0..self.policy.attempts {
            match self.source.document(post).await {
                Ok(Some(doc)) => return Some(doc),
                Ok(None) => self.logs.warn(format!(
                    "[document retry {}/{}] {}: empty response",
                    attempt + 1,
                    self.policy.attempts,
                    post
                )),
                Err(e) if e.is_permanent() => {
                    self.logs.error(format!("Cannot fetch document {}: {}", post, e));
                    return None;
                }
                Err(e) => self.logs.warn(format!(
                    "[document retry {}/{}] {}: {}",
                    attempt + 1,
                    self.policy.attempts,
                    post,
                    e
                )),
            }
            self.backoff(attempt).await;
        }
        self.logs.error(format!(
            "Giving up on document {} after {} attempts",
            post, self.policy.attempts
        ));
        None
    }

    /// Lazily yield the comments of `post`.
    ///
    /// A failure mid-stream restarts the whole stream from its first comment,
    /// so already-yielded comments may be yielded again. After the last
    /// attempt the stream simply ends. Only a stream that cannot be opened at
    /// all is reported as an error.
    pub fn iterate_comments<'a>(&'a self, post: &'a PostRef) -> Result<BoxStream<'a, CommentRecord>> {
        let first = self.source.comments(post)?;
        let retry = CommentRetry {
            fetcher: self,
            post,
            current: Some(first),
            attempt: 0,
            done: false,
        };

        Ok(stream::unfold(retry, |mut retry| async move {
            let comment = retry.next_comment().await?;
            Some((comment, retry))
        })
        .boxed())
    }

    async fn backoff(&self, attempt: u32) {
        if attempt + 1 < self.policy.attempts {
            tokio::time::sleep(self.policy.delay(attempt)).await;
        }
    }
}

struct CommentRetry<'a> {
    fetcher: &'a RetryingFetcher,
    post: &'a PostRef,
    current: Option<CommentStream<'a>>,
    attempt: u32,
    done: bool,
}

impl CommentRetry<'_> {
    async fn next_comment(&mut self) -> Option<CommentRecord> {
        let attempts = self.fetcher.policy.attempts;
        loop {
            if self.done {
                return None;
            }
            if self.current.is_none() {
                match self.fetcher.source.comments(self.post) {
                    Ok(stream) => self.current = Some(stream),
                    Err(e) => {
                        self.fetcher.logs.error(format!(
                            "Cannot reopen comments of {}: {}",
                            self.post, e
                        ));
                        self.done = true;
                        return None;
                    }
                }
            }
            let stream = self.current.as_mut()?;

            match stream.next().await {
                Some(Ok(comment)) => return Some(comment),
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.current = None;
                    self.fetcher.logs.warn(format!(
                        "[comment retry {}/{}] {}: {}",
                        self.attempt + 1,
                        attempts,
                        self.post,
                        e
                    ));
                    self.fetcher.backoff(self.attempt).await;
                    self.attempt += 1;
                    if self.attempt >= attempts {
                        self.fetcher.logs.error(format!(
                            "Giving up on comments of {} after {} attempts",
                            self.post, attempts
                        ));
                        self.done = true;
                        return None;
                    }
                }
            }
        }
    }
}
