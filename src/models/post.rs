//! Posts, comments and board references as delivered by a board source.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Naive timestamp layouts accepted from sources that omit a zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A board to crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRef {
    /// Board identifier as used by the source
    pub id: String,

    /// Distinguishes the "minor" board variant from the main one
    #[serde(default)]
    pub minor: bool,
}

impl BoardRef {
    pub fn new(id: impl Into<String>, minor: bool) -> Self {
        Self {
            id: id.into(),
            minor,
        }
    }
}

/// Opaque handle to one listing entry; documents and comments are fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub board_id: String,
    pub post_id: String,
    /// Listing page the reference was found on
    #[serde(default)]
    pub page: u32,
}

impl PostRef {
    pub fn new(board_id: impl Into<String>, post_id: impl Into<String>, page: u32) -> Self {
        Self {
            board_id: board_id.into(),
            post_id: post_id.into(),
            page,
        }
    }
}

impl std::fmt::Display for PostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} (page {})", self.board_id, self.post_id, self.page)
    }
}

/// A full post document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Author display name
    pub author: String,

    #[serde(default)]
    pub author_id: Option<String>,

    /// Raw timestamp exactly as the source serialized it
    pub time: String,

    /// Native post id, when the source has one
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

impl PostRecord {
    /// Rank-table key of the author.
    pub fn author_key(&self) -> String {
        author_key(&self.author, self.author_id.as_deref())
    }

    /// Document time normalized to UTC.
    pub fn time_utc(&self) -> Result<DateTime<Utc>> {
        normalize_time(&self.time)
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author: String,

    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub time: String,
}

/// Per-post comment dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentKey {
    Native(String),
    Content {
        author: String,
        content: String,
        time: String,
    },
}

impl CommentRecord {
    pub fn dedup_key(&self) -> CommentKey {
        match &self.id {
            Some(id) => CommentKey::Native(id.clone()),
            None => CommentKey::Content {
                author: self.author.clone(),
                content: self.content.clone(),
                time: self.time.clone(),
            },
        }
    }

    /// Rank-table key of the comment author.
    ///
    /// A blank nickname is fine while the author id is present; only a
    /// comment with neither is rejected.
    pub fn author_key(&self) -> Result<String> {
        let has_id = self.author_id.as_deref().is_some_and(|id| !id.trim().is_empty());
        if self.author.trim().is_empty() && !has_id {
            return Err(AppError::validation(format!(
                "comment {:?} has no author",
                self.id
            )));
        }
        Ok(author_key(&self.author, self.author_id.as_deref()))
    }
}

/// `"{nick}({id})"`, or the bare nickname when the author has no id.
pub fn author_key(nick: &str, author_id: Option<&str>) -> String {
    match author_id {
        Some(id) => format!("{nick}({id})"),
        None => nick.to_string(),
    }
}

/// Normalize a source timestamp to UTC.
///
/// Zoned timestamps are converted; naive ones are taken to already be UTC.
pub fn normalize_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
        return Ok(zoned.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(AppError::time_parse(raw, "not RFC 3339 or a known naive layout"))
}
