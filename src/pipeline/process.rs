// src/pipeline/process.rs

//! Per-post classification and tallying.

use std::collections::HashSet;

use chrono::Utc;
use futures::StreamExt;

use crate::error::Result;
use crate::models::{CrawlState, PostRef, RankTable, TimeWindow, WindowPosition};
use crate::services::{RetryingFetcher, identify};
use crate::storage::SnapshotStorage;
use crate::utils::LogChannel;

/// Outcome of processing one listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Counted
    InRange,
    /// Older than the window
    Old,
    /// Not counted and not old: unavailable, duplicate, too recent or unparsable
    Skip,
}

/// Classifies posts against a window and tallies authors of accepted ones.
pub struct PostProcessor<'a> {
    fetcher: &'a RetryingFetcher,
    storage: &'a dyn SnapshotStorage,
    window: TimeWindow,
    checkpoint_every: u64,
    logs: LogChannel,
}

impl<'a> PostProcessor<'a> {
    pub fn new(
        fetcher: &'a RetryingFetcher,
        storage: &'a dyn SnapshotStorage,
        window: TimeWindow,
        checkpoint_every: u64,
        logs: LogChannel,
    ) -> Self {
        Self {
            fetcher,
            storage,
            window,
            checkpoint_every: checkpoint_every.max(1),
            logs,
        }
    }

    /// Process one post reference, updating `state` when it is in range.
    pub async fn process(&self, post: &PostRef, state: &mut CrawlState) -> Verdict {
        let Some(doc) = self.fetcher.fetch_document(post).await else {
            return Verdict::Skip;
        };

        let uid = identify(&doc);
        if state.seen_posts.contains(&uid) {
            self.logs
                .info(format!("Duplicate post {uid} ({post}) not counted"));
            return Verdict::Skip;
        }
        state.seen_posts.insert(uid);

        let time = match doc.time_utc() {
            Ok(time) => time,
            Err(e) => {
                self.logs.warn(format!("[time parse] {post}: {e}"));
                return Verdict::Skip;
            }
        };

        match self.window.position(time) {
            WindowPosition::After => return Verdict::Skip,
            WindowPosition::Before => {
                self.logs.debug(format!(
                    "[out of range] {post} at {time} is before {}",
                    self.window.start
                ));
                return Verdict::Old;
            }
            WindowPosition::Within => {}
        }

        state.global_count += 1;
        state.observe(time);
        state.rank.add_article(&doc.author_key());

        if state.global_count % self.checkpoint_every == 0 {
            self.checkpoint(state, &doc.time).await;
        }

        match self.tally_comments(post, &mut state.rank).await {
            Ok(count) => {
                self.logs
                    .debug(format!("{post}: counted {count} comments"));
                Verdict::InRange
            }
            Err(e) => {
                self.logs
                    .error(format!("[comment phase] {post}: {e}"));
                Verdict::Skip
            }
        }
    }

    /// Count each distinct comment of `post` once toward its author's replies.
    async fn tally_comments(&self, post: &PostRef, rank: &mut RankTable) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut counted = 0;
        let mut comments = self.fetcher.iterate_comments(post)?;

        while let Some(comment) = comments.next().await {
            if !seen.insert(comment.dedup_key()) {
                continue;
            }
            match comment.author_key() {
                Ok(key) => {
                    rank.add_reply(&key);
                    counted += 1;
                }
                Err(e) => self.logs.warn(format!("[comment] {post}: {e}")),
            }
        }
        Ok(counted)
    }

    async fn checkpoint(&self, state: &CrawlState, doc_time: &str) {
        let elapsed = state.elapsed_minutes(Utc::now());
        match self.storage.save_snapshot(state).await {
            Ok(()) => self.logs.info(format!(
                "[checkpoint] {} posts at {doc_time} | elapsed {elapsed:.2} min",
                state.global_count
            )),
            Err(e) => self
                .logs
                .error(format!("[checkpoint] snapshot failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{CommentRecord, RankEntry};
    use crate::pipeline::testing::{FakeBoard, MemoryStorage, comment};
    use crate::services::RetryPolicy;
    use crate::utils::LogLevel;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn fetcher(board: FakeBoard) -> RetryingFetcher {
        RetryingFetcher::new(
            Arc::new(board),
            RetryPolicy::new(2, Duration::from_millis(1)),
            LogChannel::new(100, LogLevel::Debug),
        )
    }

    fn processor<'a>(
        fetcher: &'a RetryingFetcher,
        storage: &'a MemoryStorage,
        checkpoint_every: u64,
    ) -> PostProcessor<'a> {
        PostProcessor::new(
            fetcher,
            storage,
            window(),
            checkpoint_every,
            LogChannel::new(100, LogLevel::Debug),
        )
    }

    fn post_ref(id: &str) -> PostRef {
        PostRef::new("b", id, 1)
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let board = FakeBoard::with_pages(&[&[
            ("start", "a", "2024-01-01T00:00:00Z"),
            ("end", "b", "2025-01-01T00:00:00Z"),
            ("old", "c", "2023-12-31T23:59:59Z"),
        ]]);
        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        assert_eq!(
            processor.process(&post_ref("start"), &mut state).await,
            Verdict::InRange
        );
        assert_eq!(
            processor.process(&post_ref("end"), &mut state).await,
            Verdict::Skip
        );
        assert_eq!(
            processor.process(&post_ref("old"), &mut state).await,
            Verdict::Old
        );
        assert_eq!(state.global_count, 1);
        assert_eq!(state.rank.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_counted_once() {
        let board = FakeBoard::with_pages(&[&[("p1", "a", "2024-06-01 12:00:00")]]);
        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        assert_eq!(
            processor.process(&post_ref("p1"), &mut state).await,
            Verdict::InRange
        );
        assert_eq!(
            processor.process(&post_ref("p1"), &mut state).await,
            Verdict::Skip
        );
        assert_eq!(state.global_count, 1);
        assert_eq!(
            state.rank.get("a(a-id)"),
            Some(&RankEntry {
                article: 1,
                reply: 0
            })
        );
    }

    #[tokio::test]
    async fn test_missing_document_is_skipped() {
        let fetcher = fetcher(FakeBoard::default());
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        assert_eq!(
            processor.process(&post_ref("ghost"), &mut state).await,
            Verdict::Skip
        );
        assert!(state.seen_posts.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_time_is_skipped() {
        let board = FakeBoard::with_pages(&[&[("p1", "a", "yesterday")]]);
        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        assert_eq!(
            processor.process(&post_ref("p1"), &mut state).await,
            Verdict::Skip
        );
        assert_eq!(state.global_count, 0);
    }

    #[tokio::test]
    async fn test_comments_deduplicated_per_post() {
        let mut board = FakeBoard::with_pages(&[&[
            ("p1", "a", "2024-06-01 12:00:00"),
            ("p2", "b", "2024-06-02 12:00:00"),
        ]]);
        board.add_comments(
            "p1",
            vec![
                comment(Some("1"), "x", "hi"),
                comment(Some("1"), "x", "hi"),
                comment(None, "y", "same"),
                comment(None, "y", "same"),
                CommentRecord {
                    author_id: None,
                    ..comment(None, "", "anonymous")
                },
                comment(Some("2"), "a", "self reply"),
            ],
        );
        // Same native id on another post is a different comment.
        board.add_comments("p2", vec![comment(Some("1"), "x", "hi")]);

        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        processor.process(&post_ref("p1"), &mut state).await;
        processor.process(&post_ref("p2"), &mut state).await;

        assert_eq!(state.rank.get("x(x-id)").map(|e| e.reply), Some(2));
        assert_eq!(state.rank.get("y(y-id)").map(|e| e.reply), Some(1));
        assert_eq!(
            state.rank.get("a(a-id)"),
            Some(&RankEntry {
                article: 1,
                reply: 1
            })
        );
        assert!(state.rank.get("").is_none());
    }

    #[tokio::test]
    async fn test_comment_without_nick_counts_for_author_id() {
        let mut board = FakeBoard::with_pages(&[&[("p1", "a", "2024-06-01 12:00:00")]]);
        board.add_comments(
            "p1",
            vec![CommentRecord {
                author: String::new(),
                author_id: Some("zid".into()),
                ..comment(Some("9"), "", "no nick")
            }],
        );

        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        processor.process(&post_ref("p1"), &mut state).await;

        assert_eq!(state.rank.get("(zid)").map(|e| e.reply), Some(1));
        assert_eq!(state.rank.get("a(a-id)").map(|e| e.article), Some(1));
    }

    #[tokio::test]
    async fn test_broken_comment_phase_skips_post_but_keeps_article() {
        let mut board = FakeBoard::with_pages(&[&[("p1", "a", "2024-06-01 12:00:00")]]);
        board.broken_comments.push("p1".into());
        let fetcher = fetcher(board);
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 50);
        let mut state = CrawlState::new();

        assert_eq!(
            processor.process(&post_ref("p1"), &mut state).await,
            Verdict::Skip
        );
        assert_eq!(state.global_count, 1);
        assert_eq!(state.rank.get("a(a-id)").map(|e| e.article), Some(1));
    }

    #[tokio::test]
    async fn test_checkpoint_every_n_accepted() {
        let posts: Vec<(String, String)> = (0..5)
            .map(|i| (format!("p{i}"), format!("2024-06-0{} 00:00:00", i + 1)))
            .collect();
        let page: Vec<(&str, &str, &str)> = posts
            .iter()
            .map(|(id, time)| (id.as_str(), "a", time.as_str()))
            .collect();
        let fetcher = fetcher(FakeBoard::with_pages(&[page.as_slice()]));
        let storage = MemoryStorage::default();
        let processor = processor(&fetcher, &storage, 2);
        let mut state = CrawlState::new();

        for (id, _) in &posts {
            processor.process(&post_ref(id), &mut state).await;
        }
        assert_eq!(state.global_count, 5);
        assert_eq!(storage.saves(), 2);
        assert_eq!(storage.last().unwrap().global_count, 4);
    }
}
