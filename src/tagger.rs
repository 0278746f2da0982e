//! Keyword-based product tagging.
//!
//! Each tracked product owns a set of case-insensitive keywords; an item is
//! tagged with every product whose keywords appear anywhere in its text.

use std::collections::BTreeSet;

use crate::config::Product;
use crate::model::NewsItem;

/// Immutable product → keyword table, built once per run.
#[derive(Debug, Clone)]
pub struct ProductTagger {
    products: Vec<(String, Vec<String>)>,
    keywords: Vec<String>,
}

impl ProductTagger {
    pub fn new(products: &[Product]) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        for product in products {
            for keyword in &product.keywords {
                let keyword = keyword.trim();
                if keyword.is_empty() {
                    continue;
                }
                if seen.insert(keyword.to_lowercase()) {
                    keywords.push(keyword.to_string());
                }
            }
        }

        let products = products
            .iter()
            .map(|p| {
                let lowered = p
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (p.name.clone(), lowered)
            })
            .collect();

        Self { products, keywords }
    }

    /// Products whose keywords appear in `text`.
    pub fn tag_text(&self, text: &str) -> BTreeSet<String> {
        let text = text.to_lowercase();
        self.products
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn tag(&self, item: &NewsItem) -> BTreeSet<String> {
        self.tag_text(&item.full_text())
    }

    pub fn apply(&self, item: &mut NewsItem) {
        item.tags = self.tag(item);
    }

    /// True when any tracked keyword appears in `text`. Collectors use this to
    /// drop off-topic search hits.
    pub fn matches_any(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.products
            .iter()
            .flat_map(|(_, keywords)| keywords.iter())
            .any(|k| text.contains(k.as_str()))
    }

    /// Every keyword across products, de-duplicated case-insensitively, in
    /// configuration order. Used to build search queries.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Tag an item against a product table.
pub fn tag(item: &NewsItem, products: &[Product]) -> BTreeSet<String> {
    ProductTagger::new(products).tag(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;
    use chrono::Utc;

    fn products() -> Vec<Product> {
        vec![
            Product::new("Claude", &["Claude Code", "Claude", "Anthropic"]),
            Product::new("GitHub Copilot", &["GitHub Copilot", "Copilot"]),
            Product::new("Cursor", &["Cursor"]),
        ]
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        let tagger = ProductTagger::new(&products());
        let tags = tagger.tag_text("ANTHROPIC ships a new model");
        assert_eq!(tags, BTreeSet::from(["Claude".to_string()]));
    }

    #[test]
    fn test_tag_multiple_products() {
        let tagger = ProductTagger::new(&products());
        let tags = tagger.tag_text("Comparing Copilot and Cursor for refactoring");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("GitHub Copilot"));
        assert!(tags.contains("Cursor"));
    }

    #[test]
    fn test_no_match_is_empty() {
        let tagger = ProductTagger::new(&products());
        assert!(tagger.tag_text("Rust 1.80 released").is_empty());
        assert!(!tagger.matches_any("Rust 1.80 released"));
    }

    #[test]
    fn test_tag_uses_content() {
        let item = NewsItem::new("New release notes", Source::Reddit, "", Utc::now())
            .with_content("The claude code CLI now supports hooks");
        let tags = tag(&item, &products());
        assert!(tags.contains("Claude"));
    }

    #[test]
    fn test_keywords_deduplicated_in_order() {
        let mut products = products();
        products.push(Product::new("Other", &["claude", "Devin"]));
        let tagger = ProductTagger::new(&products);
        assert_eq!(
            tagger.keywords(),
            &[
                "Claude Code",
                "Claude",
                "Anthropic",
                "GitHub Copilot",
                "Copilot",
                "Cursor",
                "Devin"
            ]
        );
    }

    #[test]
    fn test_empty_keywords_never_match() {
        let tagger = ProductTagger::new(&[Product::new("Ghost", &["", "  "])]);
        assert!(tagger.tag_text("anything at all").is_empty());
        assert!(!tagger.matches_any("anything at all"));
    }

    #[test]
    fn test_blank_keywords_not_searched() {
        let tagger = ProductTagger::new(&[
            Product::new("Ghost", &["", "  "]),
            Product::new("Cursor", &[" Cursor ", "cursor"]),
        ]);
        assert_eq!(tagger.keywords(), &["Cursor"]);
    }
}
