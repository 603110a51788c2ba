// src/pipeline/aggregate.rs

//! Per-identity aggregation, scoring and dense ranking.
//!
//! Rank-table keys look like `nick(author_id)`. Every key sharing an author id
//! is folded into one [`IdentityAggregate`]; keys without an id cannot be
//! attributed and are dropped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{RankTable, ReportConfig};

pub const ARTICLE_WEIGHT: u64 = 3;
pub const REPLY_WEIGHT: u64 = 1;

/// Weighted activity score.
pub fn score(article: u64, reply: u64) -> u64 {
    article * ARTICLE_WEIGHT + reply * REPLY_WEIGHT
}

/// Totals for one author id across all of its nicknames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityAggregate {
    pub author_id: String,
    pub nicks: BTreeSet<String>,
    pub article: u64,
    pub reply: u64,
    pub score: u64,
    pub article_rank: u32,
    pub reply_rank: u32,
}

impl IdentityAggregate {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            nicks: BTreeSet::new(),
            article: 0,
            reply: 0,
            score: 0,
            article_rank: 0,
            reply_rank: 0,
        }
    }

    /// Add counts. Scores and ranks are stale until [`rank_aggregates`] runs.
    pub fn absorb(&mut self, article: u64, reply: u64) {
        self.article += article;
        self.reply += reply;
    }
}

/// Aggregates keyed by author id.
pub type Aggregates = BTreeMap<String, IdentityAggregate>;

/// Nicknames that are never listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickFilter {
    pub blank: String,
    pub truncation_marker: String,
}

impl NickFilter {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            blank: config.blank_nickname.clone(),
            truncation_marker: config.truncation_marker.clone(),
        }
    }

    pub fn keeps(&self, nick: &str) -> bool {
        if nick == self.blank {
            return false;
        }
        self.truncation_marker.is_empty() || !nick.ends_with(&self.truncation_marker)
    }
}

impl Default for NickFilter {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

/// Split `nick(author_id)` on its trailing parenthesized segment.
///
/// Returns `None` for bare nicknames and empty ids.
pub fn parse_key(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let (nick, id) = (&inner[..open], &inner[open + 1..]);
    if id.is_empty() {
        return None;
    }
    Some((nick, id))
}

/// Fold a rank table into per-identity totals with scores and ranks.
pub fn aggregate(table: &RankTable, filter: &NickFilter) -> Aggregates {
    let mut aggregates = Aggregates::new();
    let mut dropped = 0usize;

    for (key, entry) in table.iter() {
        let Some((nick, author_id)) = parse_key(key) else {
            dropped += 1;
            continue;
        };
        let agg = aggregates
            .entry(author_id.to_string())
            .or_insert_with(|| IdentityAggregate::new(author_id));
        agg.absorb(entry.article, entry.reply);
        if filter.keeps(nick) {
            agg.nicks.insert(nick.to_string());
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {dropped} rank entries without an author id");
    }

    rank_aggregates(&mut aggregates);
    aggregates
}

/// Recompute scores and both dense rank columns.
pub fn rank_aggregates(aggregates: &mut Aggregates) {
    for agg in aggregates.values_mut() {
        agg.score = score(agg.article, agg.reply);
    }

    let articles: Vec<u64> = aggregates.values().map(|a| a.article).collect();
    let replies: Vec<u64> = aggregates.values().map(|a| a.reply).collect();
    let article_ranks = dense_ranks(&articles);
    let reply_ranks = dense_ranks(&replies);

    for ((agg, ar), rr) in aggregates
        .values_mut()
        .zip(article_ranks)
        .zip(reply_ranks)
    {
        agg.article_rank = ar;
        agg.reply_rank = rr;
    }
}

/// Dense descending ranks of `values`, returned in input order.
///
/// Equal values share a rank and the next distinct value takes the next
/// integer: `[10, 10, 7, 5]` ranks as `[1, 1, 2, 3]`.
pub fn dense_ranks(values: &[u64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].cmp(&values[a]));

    let mut ranks = vec![0; values.len()];
    let mut rank = 0;
    let mut prev = None;
    for idx in order {
        if prev != Some(values[idx]) {
            rank += 1;
            prev = Some(values[idx]);
        }
        ranks[idx] = rank;
    }
    ranks
}

/// One row of the score leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedAuthor<'a> {
    pub rank: u32,
    pub aggregate: &'a IdentityAggregate,
}

/// Leaderboard rows plus the sum of their scores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopList<'a> {
    pub entries: Vec<RankedAuthor<'a>>,
    pub total_score: u64,
}

/// Score leaderboard limited to the first `limit` distinct rank values.
///
/// A tie group whose rank is within `limit` is kept whole even when that
/// pushes the row count past `limit`. `None` keeps everyone.
pub fn extract_top(aggregates: &Aggregates, limit: Option<usize>) -> TopList<'_> {
    let mut sorted: Vec<&IdentityAggregate> = aggregates.values().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    let scores: Vec<u64> = sorted.iter().map(|a| a.score).collect();
    let ranks = dense_ranks(&scores);

    let entries: Vec<RankedAuthor<'_>> = sorted
        .into_iter()
        .zip(ranks)
        .take_while(|(_, rank)| limit.is_none_or(|l| (*rank as usize) <= l))
        .map(|(aggregate, rank)| RankedAuthor { rank, aggregate })
        .collect();
    let total_score = entries.iter().map(|e| e.aggregate.score).sum();

    TopList {
        entries,
        total_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RankEntry;

    fn table(entries: &[(&str, u64, u64)]) -> RankTable {
        entries
            .iter()
            .map(|(key, article, reply)| {
                (
                    key.to_string(),
                    RankEntry {
                        article: *article,
                        reply: *reply,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_dense_ranks() {
        assert_eq!(dense_ranks(&[10, 10, 7, 5, 5, 5]), vec![1, 1, 2, 3, 3, 3]);
        assert_eq!(dense_ranks(&[5, 10, 7, 10]), vec![3, 1, 2, 1]);
        assert!(dense_ranks(&[]).is_empty());
    }

    #[test]
    fn test_score_weights() {
        assert_eq!(score(4, 2), 14);
        assert_eq!(score(0, 0), 0);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("nick(abc)"), Some(("nick", "abc")));
        assert_eq!(parse_key("a(b)(c)"), Some(("a(b)", "c")));
        assert_eq!(parse_key("bare"), None);
        assert_eq!(parse_key("empty()"), None);
        assert_eq!(parse_key("open(abc"), None);
    }

    #[test]
    fn test_merge_by_author_id() {
        let aggs = aggregate(
            &table(&[
                ("alice(a1)", 2, 3),
                ("ali..(a1)", 1, 0),
                ("ㅤ(a1)", 0, 4),
                ("bob(b2)", 1, 1),
                ("guest", 9, 9),
            ]),
            &NickFilter::default(),
        );

        assert_eq!(aggs.len(), 2);
        let alice = &aggs["a1"];
        assert_eq!(alice.article, 3);
        assert_eq!(alice.reply, 7);
        assert_eq!(alice.score, 16);
        assert_eq!(alice.nicks.iter().collect::<Vec<_>>(), vec!["alice"]);
        assert_eq!((alice.article_rank, alice.reply_rank), (1, 1));

        let bob = &aggs["b2"];
        assert_eq!((bob.article_rank, bob.reply_rank), (2, 2));
    }

    #[test]
    fn test_nickless_identity_is_kept() {
        let aggs = aggregate(&table(&[("ㅤ(x)", 1, 0)]), &NickFilter::default());
        assert!(aggs["x"].nicks.is_empty());
        assert_eq!(aggs["x"].article, 1);
    }

    #[test]
    fn test_extract_top_keeps_whole_tie_groups() {
        // Scores 30, 20, 10, 10, 10, 5
        let aggs = aggregate(
            &table(&[
                ("a(1)", 10, 0),
                ("b(2)", 0, 20),
                ("c(3)", 0, 10),
                ("d(4)", 0, 10),
                ("e(5)", 0, 10),
                ("f(6)", 0, 5),
            ]),
            &NickFilter::default(),
        );

        let top = extract_top(&aggs, Some(2));
        let ids: Vec<_> = top.entries.iter().map(|e| e.aggregate.author_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(top.total_score, 50);

        let top = extract_top(&aggs, Some(3));
        assert_eq!(top.entries.len(), 5);
        assert_eq!(
            top.entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 3, 3]
        );
        assert_eq!(top.total_score, 80);

        assert_eq!(extract_top(&aggs, None).entries.len(), 6);
    }

    #[test]
    fn test_empty_table() {
        let aggs = aggregate(&RankTable::new(), &NickFilter::default());
        assert!(aggs.is_empty());
        let top = extract_top(&aggs, Some(10));
        assert!(top.entries.is_empty());
        assert_eq!(top.total_score, 0);
    }
}
