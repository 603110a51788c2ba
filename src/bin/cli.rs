//! gallrank CLI
//!
//! Local execution entry point: crawl a board, render and merge reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use gallrank::{
    error::{AppError, Result},
    models::{Config, ReportFormat},
    pipeline::{self, CrawlJob, CrawlRunner, CrawlStatus},
    services::{HttpBoardSource, RetryPolicy},
    storage::{LocalStorage, SnapshotStorage},
    utils::{LogChannel, LogCursor, LogLevel},
};

/// gallrank - Board activity ranking
#[derive(Parser, Debug)]
#[command(
    name = "gallrank",
    version,
    about = "Crawls a community board and ranks authors by activity"
)]
struct Cli {
    /// Path to storage directory holding config, snapshot and report
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the board and write the snapshot
    Crawl {
        /// Board id
        #[arg(long)]
        board: Option<String>,

        /// Crawl the minor board variant
        #[arg(long, conflicts_with = "major")]
        minor: bool,

        /// Crawl the main board variant
        #[arg(long)]
        major: bool,

        /// First listing page
        #[arg(long)]
        start_page: Option<u32>,

        /// Window start (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Window end, exclusive (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        /// Render the report once the crawl finishes
        #[arg(long)]
        report: bool,
    },

    /// Render the report from the latest snapshot
    Report {
        /// Output format: html or text
        #[arg(long)]
        format: Option<ReportFormat>,

        /// Number of distinct ranks to list
        #[arg(long)]
        top: Option<usize>,
    },

    /// Merge previously generated HTML reports
    Merge {
        /// Report files to merge
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long)]
        format: Option<ReportFormat>,

        #[arg(long)]
        top: Option<usize>,
    },

    /// Validate configuration
    Validate,

    /// Show current snapshot info
    Info,
}

/// Variant override from `--minor` / `--major`; `None` keeps the config value.
fn board_variant(minor: bool, major: bool) -> Option<bool> {
    match (minor, major) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Forward new crawl log lines to the process logger.
fn drain_logs(logs: &LogChannel, cursor: &mut LogCursor) {
    let missed = cursor.missed;
    for line in logs.read(cursor) {
        let level = match line.level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        };
        log::log!(level, "{}", line.message);
    }
    if cursor.missed > missed {
        log::warn!("{} crawl log lines dropped", cursor.missed - missed);
    }
}

fn log_status(status: &CrawlStatus) {
    log::info!(
        "[{:?}] page {} | seen {} | accepted {} | authors {} | old streak {}",
        status.phase,
        status.page,
        status.posts_seen,
        status.accepted,
        status.authors,
        status.consecutive_old
    );
}

async fn crawl(config: &Config, storage: LocalStorage) -> Result<()> {
    let logs = LogChannel::new(
        config.logging.buffer_capacity,
        LogLevel::from_str(&config.logging.level),
    );
    let source = Arc::new(HttpBoardSource::new(&config.crawler)?);
    let mut runner = CrawlRunner::new(
        source,
        Arc::new(storage),
        RetryPolicy::from(&config.crawler),
        config.crawler.page_probe_timeout(),
        logs.clone(),
    );

    let mut cursor = LogCursor::default();
    let started = runner.start(CrawlJob::from_config(config)?).await;
    drain_logs(&logs, &mut cursor);
    started?;

    let mut status = runner.status();
    let mut ticker =
        tokio::time::interval(Duration::from_millis(config.logging.status_poll_ms.max(10)));

    while runner.is_running() {
        tokio::select! {
            _ = ticker.tick() => {
                drain_logs(&logs, &mut cursor);
                if status.has_changed().unwrap_or(false) {
                    log_status(&status.borrow_and_update());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupted, stopping after the current post...");
                runner.cancel();
            }
        }
    }

    let summary = runner.join().await;
    drain_logs(&logs, &mut cursor);
    log_status(&status.borrow());
    let summary = summary?;

    log::info!(
        "Crawl finished ({:?}): {} pages, {} of {} posts accepted, {} authors",
        summary.stop_reason,
        summary.pages_visited,
        summary.accepted,
        summary.posts_seen,
        summary.authors
    );
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let mut config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", config_path.display());

    let storage = LocalStorage::new(&cli.storage_dir, &config.paths);

    match cli.command {
        Command::Crawl {
            board,
            minor,
            major,
            start_page,
            start,
            end,
            report,
        } => {
            if let Some(board) = board {
                config.board.id = board;
            }
            if let Some(minor) = board_variant(minor, major) {
                config.board.minor = minor;
            }
            if let Some(page) = start_page {
                config.board.start_page = page;
            }
            if let Some(start) = start {
                config.window.start = start;
            }
            if let Some(end) = end {
                config.window.end = end;
            }
            config.validate()?;

            crawl(&config, storage.clone()).await?;

            if report {
                let outcome = pipeline::run_report(&storage, &config.report).await?;
                log::info!(
                    "Report lists {} of {} authors: {}",
                    outcome.listed,
                    outcome.authors,
                    outcome.path.display()
                );
            }
        }

        Command::Report { format, top } => {
            if let Some(format) = format {
                config.report.format = format;
            }
            if top.is_some() {
                config.report.top = top;
            }

            let outcome = pipeline::run_report(&storage, &config.report).await?;
            log::info!(
                "Report lists {} of {} authors (total score {}): {}",
                outcome.listed,
                outcome.authors,
                outcome.total_score,
                outcome.path.display()
            );
        }

        Command::Merge { files, format, top } => {
            if let Some(format) = format {
                config.report.format = format;
            }
            if top.is_some() {
                config.report.top = top;
            }

            let outcome = pipeline::run_merge(&files, &storage, &config.report).await?;
            log::info!(
                "Merged report lists {} of {} authors: {}",
                outcome.listed,
                outcome.authors,
                outcome.path.display()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK (board '{}', window {} ~ {})",
                config.board.id,
                config.window.start,
                config.window.end
            );
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            match storage.load_snapshot().await {
                Ok(state) => {
                    let (start, end) = state.report_window();
                    log::info!("Snapshot: {}", storage.snapshot_path().display());
                    log::info!("Created: {}", state.date);
                    log::info!("Window: {} ~ {}", start, end);
                    log::info!(
                        "Accepted posts: {}, seen posts: {}, rank entries: {}",
                        state.global_count,
                        state.seen_posts.len(),
                        state.rank.len()
                    );
                }
                Err(AppError::DataFile(msg)) => log::info!("No snapshot found yet ({msg})."),
                Err(e) => return Err(e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
