//! In-memory cache model and merge rules

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last-known franking figures for one security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Amount-weighted franking percentage (0-100)
    pub franking: f64,
    /// Trailing-12-month cash dividend, absent in files written by older scrapers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend12: Option<f64>,
    /// When the values last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields this version doesn't know, such as the older scraper's naive `timestamp`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheEntry {
    /// Creates an entry from freshly scraped figures
    pub fn scraped(franking: f64, dividend12: f64, at: DateTime<Utc>) -> Self {
        Self {
            franking,
            dividend12: Some(dividend12),
            updated_at: Some(at),
            extra: Map::new(),
        }
    }

    /// Whether two entries carry the same figures, ignoring timestamps
    pub fn same_values(&self, other: &CacheEntry) -> bool {
        self.franking == other.franking && self.dividend12 == other.dividend12
    }
}

/// Ticker to entry mapping, serialized as a flat JSON object
///
/// Backed by a `BTreeMap` so the file is written in a stable key order and an
/// unchanged cache serializes to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cache {
    entries: BTreeMap<String, CacheEntry>,
}

impl Cache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a ticker, if cached
    pub fn get(&self, code: &str) -> Option<&CacheEntry> {
        self.entries.get(code)
    }

    /// Stores an entry, returning the one it replaced
    pub fn insert(&mut self, code: impl Into<String>, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(code.into(), entry)
    }

    /// Number of cached tickers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tickers are cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tickers in sorted order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Result of overlaying candidates onto an existing cache
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged cache
    pub cache: Cache,
    /// Tickers that were added or whose figures changed
    pub changed: Vec<String>,
    /// Tickers scraped again with the same figures
    pub unchanged: Vec<String>,
}

/// Overlays freshly scraped candidates onto an existing cache.
///
/// A candidate replaces the stored entry for its ticker, unless the figures are
/// identical, in which case the stored entry (and its `updated_at`) is kept.
/// Tickers with no candidate are carried over untouched, so a merge never
/// drops entries and merging the same candidates twice is a no-op.
pub fn merge<I>(existing: &Cache, candidates: I) -> MergeOutcome
where
    I: IntoIterator<Item = (String, CacheEntry)>,
{
    let mut cache = existing.clone();
    let mut changed = Vec::new();
    let mut unchanged = Vec::new();

    for (code, candidate) in candidates {
        match cache.get(&code) {
            Some(stored) if stored.same_values(&candidate) => unchanged.push(code),
            _ => {
                cache.insert(code.clone(), candidate);
                changed.push(code);
            }
        }
    }

    MergeOutcome {
        cache,
        changed,
        unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap()
    }

    fn existing() -> Cache {
        let mut cache = Cache::new();
        cache.insert("BHP", CacheEntry::scraped(100.0, 2.5, at(1)));
        cache.insert("VHY", CacheEntry::scraped(72.15, 3.9, at(1)));
        cache
    }

    #[test]
    fn test_merge_into_empty_cache() {
        let outcome = merge(
            &Cache::new(),
            vec![("ABC".to_string(), CacheEntry::scraped(50.0, 1.0, at(2)))],
        );

        assert_eq!(outcome.cache.len(), 1);
        assert_eq!(outcome.cache.get("ABC").unwrap().franking, 50.0);
        assert_eq!(outcome.changed, vec!["ABC".to_string()]);
        assert!(outcome.unchanged.is_empty());
    }

    #[test]
    fn test_merge_preserves_untouched_entries() {
        let before = existing();
        let outcome = merge(
            &before,
            vec![("CBA".to_string(), CacheEntry::scraped(100.0, 4.65, at(2)))],
        );

        assert_eq!(outcome.cache.len(), 3);
        for code in before.codes() {
            assert_eq!(outcome.cache.get(code), before.get(code));
        }
    }

    #[test]
    fn test_candidate_wins_on_collision() {
        let outcome = merge(
            &existing(),
            vec![("VHY".to_string(), CacheEntry::scraped(68.4, 4.1, at(2)))],
        );

        let vhy = outcome.cache.get("VHY").unwrap();
        assert_eq!(vhy.franking, 68.4);
        assert_eq!(vhy.dividend12, Some(4.1));
        assert_eq!(vhy.updated_at, Some(at(2)));
        assert_eq!(outcome.changed, vec!["VHY".to_string()]);
    }

    #[test]
    fn test_same_values_keep_stored_timestamp() {
        let outcome = merge(
            &existing(),
            vec![("BHP".to_string(), CacheEntry::scraped(100.0, 2.5, at(2)))],
        );

        assert_eq!(outcome.cache, existing());
        assert_eq!(outcome.cache.get("BHP").unwrap().updated_at, Some(at(1)));
        assert_eq!(outcome.unchanged, vec!["BHP".to_string()]);
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let candidates = vec![
            ("VHY".to_string(), CacheEntry::scraped(68.4, 4.1, at(2))),
            ("WOW".to_string(), CacheEntry::scraped(100.0, 1.04, at(2))),
        ];

        let first = merge(&existing(), candidates.clone());
        let second = merge(&first.cache, candidates);

        assert_eq!(first.cache, second.cache);
        assert!(second.changed.is_empty());
        assert_eq!(second.unchanged.len(), 2);
    }

    #[test]
    fn test_legacy_entry_without_dividend_is_replaced() {
        let mut cache = Cache::new();
        cache.insert(
            "VHY",
            CacheEntry {
                franking: 72.15,
                dividend12: None,
                updated_at: None,
                extra: Map::new(),
            },
        );

        let outcome = merge(
            &cache,
            vec![("VHY".to_string(), CacheEntry::scraped(72.15, 3.9, at(2)))],
        );

        assert_eq!(outcome.changed, vec!["VHY".to_string()]);
        assert_eq!(outcome.cache.get("VHY").unwrap().dividend12, Some(3.9));
    }

    #[test]
    fn test_serializes_as_flat_sorted_object() {
        let mut cache = Cache::new();
        cache.insert("WOW", CacheEntry::scraped(100.0, 1.04, at(1)));
        cache.insert("BHP", CacheEntry::scraped(100.0, 2.5, at(1)));

        let json = serde_json::to_string(&cache).unwrap();

        assert!(json.starts_with("{\"BHP\":{\"franking\":100.0"));
        assert!(json.find("BHP").unwrap() < json.find("WOW").unwrap());
    }
}
