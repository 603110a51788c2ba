// src/pipeline/merge.rs

//! Merging previously generated HTML reports into one combined leaderboard.

use std::path::Path;

use futures::future;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ReportConfig;
use crate::pipeline::aggregate::{Aggregates, IdentityAggregate, extract_top, rank_aggregates};
use crate::pipeline::report::{MERGED_REPORT_TITLE, ReportOutcome, ReportWindow, render};
use crate::storage::LocalStorage;

const PERIOD_PATTERN: &str = r"집계 기간\s*:\s*(\d{4}/\d{2}/\d{2}\s+\d{2}:\d{2}:\d{2})\s*~\s*(\d{4}/\d{2}/\d{2}\s+\d{2}:\d{2}:\d{2})";
const ENTRY_PATTERN: &str =
    r"^\s*\d+등\s*:\s*(.*)\(([^()]*)\)\s*\|.*?글\s*(\d+)개.*?댓글\s*(\d+)개";

/// Period and per-author counts recovered from one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub window: ReportWindow,
    pub authors: Aggregates,
}

impl ParsedReport {
    /// Fold `other` into `self`: widen the period, sum counts, union nicknames.
    ///
    /// Ranks are left stale; call [`rank_aggregates`] after the last merge.
    pub fn absorb(&mut self, other: ParsedReport) {
        self.window = self.window.union(other.window);
        for (id, theirs) in other.authors {
            let ours = self
                .authors
                .entry(id)
                .or_insert_with(|| IdentityAggregate::new(theirs.author_id.clone()));
            ours.absorb(theirs.article, theirs.reply);
            ours.nicks.extend(theirs.nicks);
        }
    }
}

/// Extracts the period header and leaderboard rows from report HTML.
pub struct ReportParser {
    paragraph: Selector,
    period: Regex,
    entry: Regex,
}

impl ReportParser {
    pub fn new() -> Result<Self> {
        let paragraph =
            Selector::parse("p").map_err(|e| AppError::selector("p", format!("{e:?}")))?;
        Ok(Self {
            paragraph,
            period: Regex::new(PERIOD_PATTERN)?,
            entry: Regex::new(ENTRY_PATTERN)?,
        })
    }

    pub fn parse(&self, html: &str) -> ParsedReport {
        let document = Html::parse_document(html);
        let mut report = ParsedReport::default();
        let mut have_period = false;

        for p in document.select(&self.paragraph) {
            let text: String = p.text().collect();

            if !have_period {
                if let Some(caps) = self.period.captures(&text) {
                    report.window = ReportWindow::parse(&caps[1], &caps[2]);
                    have_period = true;
                    continue;
                }
            }

            let Some(caps) = self.entry.captures(&text) else {
                continue;
            };
            let (Ok(article), Ok(reply)) = (caps[3].parse::<u64>(), caps[4].parse::<u64>())
            else {
                continue;
            };
            let author_id = caps[2].trim().to_string();
            let agg = report
                .authors
                .entry(author_id.clone())
                .or_insert_with(|| IdentityAggregate::new(author_id));
            agg.absorb(article, reply);
            agg.nicks.extend(
                caps[1]
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
            );
        }
        report
    }
}

/// Merge parsed reports and recompute scores and ranks.
pub fn merge_reports(reports: impl IntoIterator<Item = ParsedReport>) -> ParsedReport {
    let mut merged = ParsedReport::default();
    for report in reports {
        merged.absorb(report);
    }
    rank_aggregates(&mut merged.authors);
    merged
}

async fn load_report(parser: &ReportParser, path: &str) -> Option<ParsedReport> {
    match tokio::fs::read_to_string(Path::new(path)).await {
        Ok(html) => Some(parser.parse(&html)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Report file not found: {path}");
            None
        }
        Err(e) => {
            log::warn!("Failed to read report {path}: {e}");
            None
        }
    }
}

/// Read and merge report files. Blank paths and unreadable files are skipped
/// with a warning.
pub async fn merge_report_files(paths: &[String]) -> Result<ParsedReport> {
    let valid: Vec<&str> = paths
        .iter()
        .map(String::as_str)
        .filter(|p| {
            let keep = !p.trim().is_empty();
            if !keep {
                log::warn!("Skipping blank report path");
            }
            keep
        })
        .collect();
    if valid.is_empty() {
        return Err(AppError::data_file("no report paths given"));
    }

    let parser = ReportParser::new()?;
    let loaded = future::join_all(valid.iter().map(|p| load_report(&parser, p))).await;
    let reports: Vec<ParsedReport> = loaded.into_iter().flatten().collect();
    log::info!("Merging {} of {} reports", reports.len(), valid.len());

    Ok(merge_reports(reports))
}

/// Merge `paths` and write the combined report to the configured report file.
pub async fn run_merge(
    paths: &[String],
    storage: &LocalStorage,
    config: &ReportConfig,
) -> Result<ReportOutcome> {
    let merged = merge_report_files(paths).await?;
    let top = extract_top(&merged.authors, config.top);
    let contents = render(
        config.format,
        MERGED_REPORT_TITLE,
        &merged.window,
        &merged.authors,
        &top,
    );
    let path = storage.write_report(&contents).await?;

    Ok(ReportOutcome {
        path,
        authors: merged.authors.len(),
        listed: top.entries.len(),
        total_score: top.total_score,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::models::{PathsConfig, RankEntry, RankTable};
    use crate::pipeline::aggregate::{NickFilter, aggregate};
    use crate::pipeline::report::{REPORT_TITLE, render_html};

    fn report_html(entries: &[(&str, u64, u64)], from_day: u32, to_day: u32) -> String {
        let table: RankTable = entries
            .iter()
            .map(|(k, article, reply)| {
                (
                    k.to_string(),
                    RankEntry {
                        article: *article,
                        reply: *reply,
                    },
                )
            })
            .collect();
        let aggs = aggregate(&table, &NickFilter::default());
        let top = extract_top(&aggs, None);
        let window = ReportWindow::from_utc(
            Utc.with_ymd_and_hms(2025, 2, from_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, to_day, 0, 0, 0).unwrap(),
        );
        render_html(REPORT_TITLE, &window, &aggs, &top)
    }

    #[test]
    fn test_parse_rendered_report() {
        let html = report_html(&[("alice(a1)", 2, 3), ("al(a1)", 1, 0), ("x(y)z(b2)", 0, 4)], 1, 8);
        let parsed = ReportParser::new().unwrap().parse(&html);

        assert_eq!(
            parsed.window,
            ReportWindow::parse("2025/02/01 00:00:00", "2025/02/08 00:00:00")
        );
        assert_eq!(parsed.authors.len(), 2);
        let a1 = &parsed.authors["a1"];
        assert_eq!((a1.article, a1.reply), (3, 3));
        assert_eq!(a1.nicks.iter().collect::<Vec<_>>(), vec!["al", "alice"]);
        assert!(parsed.authors["b2"].nicks.contains("x(y)z"));
    }

    #[test]
    fn test_merge_sums_and_reranks() {
        let parser = ReportParser::new().unwrap();
        let first = parser.parse(&report_html(&[("alice(a1)", 2, 0), ("bob(b2)", 1, 0)], 1, 8));
        let second = parser.parse(&report_html(&[("ally(a1)", 0, 1), ("bob(b2)", 4, 0)], 8, 14));

        let merged = merge_reports([first, second]);
        assert_eq!(
            merged.window,
            ReportWindow::parse("2025/02/01 00:00:00", "2025/02/14 00:00:00")
        );

        let a1 = &merged.authors["a1"];
        assert_eq!((a1.article, a1.reply, a1.score), (2, 1, 7));
        assert_eq!(a1.nicks.len(), 2);
        let b2 = &merged.authors["b2"];
        assert_eq!((b2.article, b2.score, b2.article_rank), (5, 15, 1));
        assert_eq!(a1.article_rank, 2);
    }

    #[tokio::test]
    async fn test_merge_files_skips_blank_and_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("week1.txt");
        std::fs::write(&path, report_html(&[("alice(a1)", 1, 1)], 1, 8)).unwrap();

        let paths = vec![
            path.display().to_string(),
            "   ".to_string(),
            tmp.path().join("missing.txt").display().to_string(),
        ];
        let merged = merge_report_files(&paths).await.unwrap();
        assert_eq!(merged.authors.len(), 1);
        assert_eq!(merged.authors["a1"].score, 4);
    }

    #[tokio::test]
    async fn test_merge_without_paths_fails() {
        let err = merge_report_files(&["".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::DataFile(_)));
    }

    #[tokio::test]
    async fn test_run_merge_writes_combined_report() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.txt");
        std::fs::write(&input, report_html(&[("alice(a1)", 1, 0)], 1, 8)).unwrap();
        let storage = LocalStorage::new(tmp.path().join("out"), &PathsConfig::default());

        let outcome = run_merge(
            &[input.display().to_string()],
            &storage,
            &ReportConfig::default(),
        )
        .await
        .unwrap();
        let html = std::fs::read_to_string(outcome.path).unwrap();
        assert!(html.contains("<title>합산 집계 결과</title>"));
        assert!(html.contains("1등 : alice(a1) | 총 점: 3점"));
    }
}
