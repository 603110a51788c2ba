//! Versioned on-disk snapshot of a [`CrawlState`].
//!
//! Date-times are RFC 3339 strings and the seen-post set is a sorted JSON
//! array; both decode back into typed fields, so no in-band type tags are
//! needed.
//!
//! ```json
//! {
//!   "version": 1,
//!   "start_date": "2024-01-03T12:00:00Z",
//!   "end_date": "2024-01-30T08:15:00Z",
//!   "date": "2024-02-01T00:00:00Z",
//!   "global_count": 1234,
//!   "start_time": "2024-02-01T00:00:00Z",
//!   "rank": { "nick(id)": { "article": 3, "reply": 10 } },
//!   "seen_posts": ["1001", "1002"]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CrawlState;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    #[serde(flatten)]
    state: &'a CrawlState,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    version: u32,
    #[serde(flatten)]
    state: CrawlState,
}

/// Encode a state as pretty JSON.
pub fn encode(state: &CrawlState) -> Result<Vec<u8>> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        state,
    };
    Ok(serde_json::to_vec_pretty(&snapshot)?)
}

/// Decode a snapshot, rejecting unknown versions and malformed data.
pub fn decode(bytes: &[u8]) -> Result<CrawlState> {
    let snapshot: SnapshotOwned = serde_json::from_slice(bytes)
        .map_err(|e| AppError::data_file(format!("malformed snapshot: {e}")))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(AppError::data_file(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }
    Ok(snapshot.state)
}
