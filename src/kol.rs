//! KOL weight resolution.
//!
//! Authors are looked up per source in the tiered KOL list. Lookups are
//! case-insensitive and ignore handle prefixes such as `@` or `u/`.

use std::collections::HashMap;

use crate::config::KolConfig;
use crate::model::{KolTier, NewsItem, Source};

/// Neutral multiplier for authors not on the list.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Normalize an author handle for comparison.
pub fn normalize_handle(handle: &str) -> String {
    let handle = handle.trim().to_lowercase();
    let handle = handle
        .strip_prefix('@')
        .or_else(|| handle.strip_prefix("/u/"))
        .or_else(|| handle.strip_prefix("u/"))
        .unwrap_or(&handle);
    handle.trim().to_string()
}

/// Per-source lookup table from normalized handle (or display name) to tier.
#[derive(Debug, Clone, Default)]
pub struct KolTable {
    by_source: HashMap<Source, HashMap<String, KolTier>>,
}

impl KolTable {
    pub fn from_config(config: &KolConfig) -> Self {
        let mut by_source: HashMap<Source, HashMap<String, KolTier>> = HashMap::new();
        for source in Source::ALL {
            for entry in config.entries(source) {
                let table = by_source.entry(source).or_default();
                for key in [&entry.handle, &entry.name] {
                    let key = normalize_handle(key);
                    if key.is_empty() {
                        continue;
                    }
                    // Keep the strongest tier if a name is listed twice.
                    table
                        .entry(key)
                        .and_modify(|t| *t = (*t).min(entry.tier))
                        .or_insert(entry.tier);
                }
            }
        }
        Self { by_source }
    }

    pub fn lookup(&self, source: Source, author: &str) -> Option<KolTier> {
        let key = normalize_handle(author);
        if key.is_empty() {
            return None;
        }
        self.by_source.get(&source)?.get(&key).copied()
    }

    /// Tier for an item: the handle is tried first, then the display name.
    pub fn tier_for(&self, item: &NewsItem) -> Option<KolTier> {
        self.lookup(item.source, &item.author_handle)
            .or_else(|| self.lookup(item.source, &item.author))
    }

    pub fn resolve_weight(&self, item: &NewsItem) -> f64 {
        self.tier_for(item)
            .map(|tier| tier.multiplier())
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Set `kol_tier` and `weight` on an item. A tier a collector already
    /// assigned survives when the table has no entry for the author.
    pub fn apply(&self, item: &mut NewsItem) {
        if let Some(tier) = self.tier_for(item) {
            item.kol_tier = Some(tier);
        }
        item.weight = item
            .kol_tier
            .map(|tier| tier.multiplier())
            .unwrap_or(DEFAULT_WEIGHT);
    }

    pub fn len(&self) -> usize {
        self.by_source.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve the KOL multiplier for an item.
pub fn resolve_weight(item: &NewsItem, table: &KolTable) -> f64 {
    table.resolve_weight(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KolEntry;
    use chrono::Utc;

    fn table() -> KolTable {
        let config = KolConfig {
            twitter: vec![
                KolEntry {
                    handle: "karpathy".to_string(),
                    name: "Andrej Karpathy".to_string(),
                    tier: KolTier::S,
                },
                KolEntry {
                    handle: "@simonw".to_string(),
                    name: String::new(),
                    tier: KolTier::A,
                },
            ],
            reddit: vec![KolEntry {
                handle: "u/helpful_dev".to_string(),
                name: String::new(),
                tier: KolTier::B,
            }],
            ..Default::default()
        };
        KolTable::from_config(&config)
    }

    fn tweet(author: &str, handle: &str) -> NewsItem {
        NewsItem::new("Claude Code thoughts", Source::Twitter, "", Utc::now())
            .with_author(author)
            .with_handle(handle)
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@Karpathy"), "karpathy");
        assert_eq!(normalize_handle(" u/Helpful_Dev "), "helpful_dev");
        assert_eq!(normalize_handle("/u/someone"), "someone");
        assert_eq!(normalize_handle("plain"), "plain");
        assert_eq!(normalize_handle(""), "");
    }

    #[test]
    fn test_tier_multipliers() {
        let table = table();
        assert_eq!(table.resolve_weight(&tweet("", "@KARPATHY")), 3.0);
        assert_eq!(table.resolve_weight(&tweet("", "simonw")), 2.0);
        assert_eq!(table.resolve_weight(&tweet("nobody", "@nobody")), 1.0);
    }

    #[test]
    fn test_display_name_fallback() {
        let table = table();
        assert_eq!(
            table.tier_for(&tweet("Andrej Karpathy", "")),
            Some(KolTier::S)
        );
    }

    #[test]
    fn test_lookup_is_per_source() {
        let table = table();
        let mut item = tweet("", "karpathy");
        item.source = Source::Reddit;
        assert_eq!(resolve_weight(&item, &table), DEFAULT_WEIGHT);

        let reddit = NewsItem::new("Cursor tips", Source::Reddit, "", Utc::now())
            .with_author("helpful_dev")
            .with_handle("u/helpful_dev");
        assert_eq!(resolve_weight(&reddit, &table), 1.5);
    }

    #[test]
    fn test_anonymous_author_is_neutral() {
        let table = table();
        assert_eq!(table.resolve_weight(&tweet("", "")), 1.0);
    }

    #[test]
    fn test_apply_sets_tier_and_weight() {
        let table = table();
        let mut item = tweet("", "@simonw");
        table.apply(&mut item);
        assert_eq!(item.kol_tier, Some(KolTier::A));
        assert_eq!(item.weight, 2.0);
    }

    #[test]
    fn test_apply_keeps_collector_tier() {
        let table = KolTable::default();
        let mut item = tweet("someone", "@someone");
        item.kol_tier = Some(KolTier::B);
        table.apply(&mut item);
        assert_eq!(item.weight, 1.5);
        assert!(table.is_empty());
    }
}
