//! Storage abstractions for crawl snapshots and reports.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Crawler configuration
//! ├── data.json             # Latest crawl snapshot (checkpoints + final)
//! └── result.txt            # Rendered report (text or HTML)
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CrawlState;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Persist a full copy of the crawl state, replacing the previous one.
    async fn save_snapshot(&self, state: &CrawlState) -> Result<()>;

    /// Load the latest snapshot.
    ///
    /// A missing or malformed snapshot is a `DataFile` error.
    async fn load_snapshot(&self) -> Result<CrawlState>;
}
