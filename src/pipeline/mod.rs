//! Pipeline entry points.
//!
//! - `run_crawl`: Crawl one board into a snapshot (see [`CrawlRunner`] for the
//!   background variant)
//! - `run_report`: Aggregate a snapshot into a leaderboard report
//! - `run_merge`: Combine previously generated reports

pub mod aggregate;
pub mod crawl;
pub mod merge;
pub mod process;
pub mod report;
pub mod runner;
pub mod status;

#[cfg(test)]
mod testing;

pub use aggregate::{
    Aggregates, IdentityAggregate, NickFilter, RankedAuthor, TopList, aggregate, dense_ranks,
    extract_top,
};
pub use crawl::{CrawlJob, CrawlSummary, StopReason, run_crawl};
pub use merge::{ParsedReport, ReportParser, merge_report_files, merge_reports, run_merge};
pub use process::{PostProcessor, Verdict};
pub use report::{ReportOutcome, ReportWindow, render, run_report};
pub use runner::CrawlRunner;
pub use status::{CrawlMonitor, CrawlPhase, CrawlStatus};
