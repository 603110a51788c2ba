// src/pipeline/report.rs

//! Leaderboard rendering (HTML and `|`-delimited text) and report generation.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Result;
use crate::models::{ReportConfig, ReportFormat};
use crate::pipeline::aggregate::{Aggregates, NickFilter, TopList, aggregate, extract_top};
use crate::storage::{LocalStorage, SnapshotStorage};

/// Timestamp layout used in report headers.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub const REPORT_TITLE: &str = "집계 결과";
pub const MERGED_REPORT_TITLE: &str = "합산 집계 결과";

const SCORE_LEGEND: &str = "(글+3점, 댓글+1점)";

/// Reporting period. Either bound may be unknown for merged reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ReportWindow {
    pub fn from_utc(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start.naive_utc()),
            end: Some(end.naive_utc()),
        }
    }

    /// Parse header bounds; unparsable bounds become unknown.
    pub fn parse(start: &str, end: &str) -> Self {
        let parse = |s: &str| NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT).ok();
        Self {
            start: parse(start),
            end: parse(end),
        }
    }

    /// Earliest start and latest end of both windows.
    pub fn union(self, other: Self) -> Self {
        Self {
            start: pick_known(self.start, other.start, |a, b| a.min(b)),
            end: pick_known(self.end, other.end, |a, b| a.max(b)),
        }
    }

    fn bound(value: Option<NaiveDateTime>) -> String {
        value
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_default()
    }
}

fn pick_known(
    a: Option<NaiveDateTime>,
    b: Option<NaiveDateTime>,
    pick: impl Fn(NaiveDateTime, NaiveDateTime) -> NaiveDateTime,
) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Percentage of `total` held by `score`; 0 when the total is 0.
pub fn share(score: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    score as f64 / total as f64 * 100.0
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Make `s` safe as one `|`-separated text field on one line.
///
/// Separators become `¦` and line breaks become spaces.
pub fn text_field(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '|' => '¦',
            '\r' | '\n' => ' ',
            _ => c,
        })
        .collect()
}

struct Totals {
    articles: u64,
    replies: u64,
    authors: usize,
}

fn totals(aggregates: &Aggregates) -> Totals {
    Totals {
        articles: aggregates.values().map(|a| a.article).sum(),
        replies: aggregates.values().map(|a| a.reply).sum(),
        authors: aggregates.len(),
    }
}

/// Render a standalone HTML leaderboard.
pub fn render_html(
    title: &str,
    window: &ReportWindow,
    aggregates: &Aggregates,
    top: &TopList<'_>,
) -> String {
    let t = totals(aggregates);
    let mut lines = vec![
        "<html>".to_string(),
        "<head>".to_string(),
        "    <meta charset=\"UTF-8\">".to_string(),
        format!("    <title>{}</title>", escape_html(title)),
        "</head>".to_string(),
        "<body style=\"font-size:12px; font-family: sans-serif;\">".to_string(),
        format!(
            "    <p>집계 기간 : {} ~ {}</p>",
            ReportWindow::bound(window.start),
            ReportWindow::bound(window.end)
        ),
        format!("    <p>{SCORE_LEGEND}</p>"),
        format!(
            "    <p>총 글 수: {}개, 총 댓글 수: {}개, 총 갤러 수: {}명</p>",
            t.articles, t.replies, t.authors
        ),
    ];

    for entry in &top.entries {
        let a = entry.aggregate;
        let nicks: Vec<&str> = a.nicks.iter().map(String::as_str).collect();
        lines.push(format!(
            "    <p>{}등 : {}({}) | 총 점: {}점 | 갤 지분(총점): {:.2}% | 글 {}개({}위), 댓글 {}개({}위)</p>",
            entry.rank,
            escape_html(&nicks.join(",")),
            escape_html(&a.author_id),
            a.score,
            share(a.score, top.total_score),
            a.article,
            a.article_rank,
            a.reply,
            a.reply_rank
        ));
        lines.push("    <hr>".to_string());
    }

    lines.push("</body>".to_string());
    lines.push("</html>".to_string());
    lines.join("\n")
}

/// Render a plain-text leaderboard with one `|`-delimited row per entry.
pub fn render_text(
    title: &str,
    window: &ReportWindow,
    aggregates: &Aggregates,
    top: &TopList<'_>,
) -> String {
    let t = totals(aggregates);
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        "집계 기간 : {} ~ {}",
        ReportWindow::bound(window.start),
        ReportWindow::bound(window.end)
    );
    let _ = writeln!(out, "{SCORE_LEGEND}");
    let _ = writeln!(
        out,
        "총 글 수: {}개, 총 댓글 수: {}개, 총 갤러 수: {}명",
        t.articles, t.replies, t.authors
    );
    let _ = writeln!(
        out,
        "rank|nicks|author_id|score|share|article|article_rank|reply|reply_rank"
    );
    for entry in &top.entries {
        let a = entry.aggregate;
        let nicks: Vec<&str> = a.nicks.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "{}|{}|{}|{}|{:.2}|{}|{}|{}|{}",
            entry.rank,
            text_field(&nicks.join(",")),
            text_field(&a.author_id),
            a.score,
            share(a.score, top.total_score),
            a.article,
            a.article_rank,
            a.reply,
            a.reply_rank
        );
    }
    out
}

pub fn render(
    format: ReportFormat,
    title: &str,
    window: &ReportWindow,
    aggregates: &Aggregates,
    top: &TopList<'_>,
) -> String {
    match format {
        ReportFormat::Html => render_html(title, window, aggregates, top),
        ReportFormat::Text => render_text(title, window, aggregates, top),
    }
}

/// What a report run produced.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub authors: usize,
    pub listed: usize,
    pub total_score: u64,
}

/// Load the snapshot, aggregate it and write the report file.
///
/// A missing or malformed snapshot is returned as an error and no report is
/// written.
pub async fn run_report(storage: &LocalStorage, config: &ReportConfig) -> Result<ReportOutcome> {
    let state = storage.load_snapshot().await?;
    let (start, end) = state.report_window();
    let window = ReportWindow::from_utc(start, end);

    let aggregates = aggregate(&state.rank, &NickFilter::from_config(config));
    let top = extract_top(&aggregates, config.top);
    log::info!(
        "Aggregated {} rank entries into {} identities, listing {}",
        state.rank.len(),
        aggregates.len(),
        top.entries.len()
    );

    let contents = render(config.format, REPORT_TITLE, &window, &aggregates, &top);
    let path = storage.write_report(&contents).await?;

    Ok(ReportOutcome {
        path,
        authors: aggregates.len(),
        listed: top.entries.len(),
        total_score: top.total_score,
    })
}
