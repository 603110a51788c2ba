//! In-memory board and storage fakes shared by pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{BoardRef, CommentRecord, CrawlState, PostRecord, PostRef};
use crate::services::{BoardSource, CommentStream};
use crate::storage::SnapshotStorage;

/// Board whose pages, documents and comments are fixed up front.
#[derive(Default)]
pub struct FakeBoard {
    pub pages: Vec<Vec<String>>,
    pub docs: HashMap<String, PostRecord>,
    pub comments: HashMap<String, Vec<CommentRecord>>,
    /// Posts whose comment stream cannot be opened
    pub broken_comments: Vec<String>,
    /// Every document request, in order
    pub requested: Mutex<Vec<String>>,
}

impl FakeBoard {
    /// One page per inner slice; each post is `(post_id, author, time)`.
    pub fn with_pages(pages: &[&[(&str, &str, &str)]]) -> Self {
        let mut board = FakeBoard::default();
        for page in pages {
            let mut ids = Vec::new();
            for (id, author, time) in page.iter() {
                ids.push(id.to_string());
                board.docs.insert(id.to_string(), post(id, author, time));
            }
            board.pages.push(ids);
        }
        board
    }

    pub fn add_comments(&mut self, post_id: &str, comments: Vec<CommentRecord>) {
        self.comments.insert(post_id.to_string(), comments);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

pub fn post(id: &str, author: &str, time: &str) -> PostRecord {
    PostRecord {
        author: author.to_string(),
        author_id: Some(format!("{author}-id")),
        time: time.to_string(),
        id: Some(id.to_string()),
        title: Some(format!("title {id}")),
        content: None,
    }
}

pub fn comment(id: Option<&str>, author: &str, content: &str) -> CommentRecord {
    CommentRecord {
        author: author.to_string(),
        author_id: Some(format!("{author}-id")),
        id: id.map(str::to_string),
        content: content.to_string(),
        time: "2024-06-01 00:00:00".to_string(),
    }
}

#[async_trait]
impl BoardSource for FakeBoard {
    async fn list_page(&self, board: &BoardRef, page: u32) -> Result<Vec<PostRef>> {
        let index = page.saturating_sub(1) as usize;
        Ok(self
            .pages
            .get(index)
            .map(|ids| {
                ids.iter()
                    .map(|id| PostRef::new(&board.id, id.clone(), page))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn document(&self, post: &PostRef) -> Result<Option<PostRecord>> {
        self.requested.lock().unwrap().push(post.post_id.clone());
        Ok(self.docs.get(&post.post_id).cloned())
    }

    fn comments<'a>(&'a self, post: &'a PostRef) -> Result<CommentStream<'a>> {
        if self.broken_comments.contains(&post.post_id) {
            return Err(AppError::fetch(post.to_string(), "no comment endpoint"));
        }
        let items = self.comments.get(&post.post_id).cloned().unwrap_or_default();
        Ok(stream::iter(items.into_iter().map(Ok)).boxed())
    }
}

/// Storage that keeps every saved snapshot.
#[derive(Default)]
pub struct MemoryStorage {
    pub saved: Mutex<Vec<CrawlState>>,
}

impl MemoryStorage {
    pub fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<CrawlState> {
        self.saved.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn save_snapshot(&self, state: &CrawlState) -> Result<()> {
        self.saved.lock().unwrap().push(state.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<CrawlState> {
        self.last()
            .ok_or_else(|| AppError::data_file("no snapshot saved"))
    }
}
