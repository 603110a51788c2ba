//! Stable post identifiers.

use sha2::{Digest, Sha256};

use crate::models::PostRecord;

/// Unique id of a post: its native id, or a SHA-256 over its identifying fields.
///
/// The hash input is `author_time_authorid[_content][_title]`, with an absent
/// author id written as the empty string and empty content/title omitted.
pub fn identify(record: &PostRecord) -> String {
    if let Some(id) = &record.id {
        return id.clone();
    }

    let mut base = format!(
        "{}_{}_{}",
        record.author,
        record.time,
        record.author_id.as_deref().unwrap_or("")
    );
    if let Some(content) = record.content.as_deref().filter(|c| !c.is_empty()) {
        base.push('_');
        base.push_str(content);
    }
    if let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) {
        base.push('_');
        base.push_str(title);
    }

    hex::encode(Sha256::digest(base.as_bytes()))
}
