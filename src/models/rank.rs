//! Per-author activity tallies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Article and reply counts for one rank-table key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub article: u64,
    pub reply: u64,
}

/// Rank table keyed by `"nick(id)"` or bare nickname.
///
/// Entries are created on first sight and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable(BTreeMap<String, RankEntry>);

impl RankTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one article for `key`.
    pub fn add_article(&mut self, key: &str) {
        self.entry(key).article += 1;
    }

    /// Count one reply for `key`.
    pub fn add_reply(&mut self, key: &str) {
        self.entry(key).reply += 1;
    }

    fn entry(&mut self, key: &str) -> &mut RankEntry {
        self.0.entry(key.to_string()).or_default()
    }

    pub fn get(&self, key: &str) -> Option<&RankEntry> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RankEntry)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, RankEntry)> for RankTable {
    fn from_iter<I: IntoIterator<Item = (String, RankEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_creates_entry() {
        let mut table = RankTable::new();
        table.add_article("nick(a1)");
        table.add_reply("other");

        assert_eq!(
            table.get("nick(a1)"),
            Some(&RankEntry {
                article: 1,
                reply: 0
            })
        );
        assert_eq!(
            table.get("other"),
            Some(&RankEntry {
                article: 0,
                reply: 1
            })
        );
    }

    #[test]
    fn test_counts_accumulate() {
        let mut table = RankTable::new();
        table.add_article("k");
        table.add_article("k");
        table.add_reply("k");
        assert_eq!(
            table.get("k"),
            Some(&RankEntry {
                article: 2,
                reply: 1
            })
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut table = RankTable::new();
        table.add_article("nick(a1)");
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"nick(a1)":{"article":1,"reply":0}}"#);
    }
}
