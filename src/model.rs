//! Item model shared by every collector and the ranking engine.
//!
//! Collectors normalize raw platform payloads into [`NewsItem`]; the tagger
//! and KOL resolver fill in `tags`, `kol_tier` and `weight` before ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Platform an item was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Hackernews,
    Reddit,
    Twitter,
    Weibo,
    Zhihu,
    TechNews,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Hackernews,
        Source::Reddit,
        Source::Twitter,
        Source::Weibo,
        Source::Zhihu,
        Source::TechNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Hackernews => "hackernews",
            Source::Reddit => "reddit",
            Source::Twitter => "twitter",
            Source::Weibo => "weibo",
            Source::Zhihu => "zhihu",
            Source::TechNews => "tech_news",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Hackernews => "Hacker News",
            Source::Reddit => "Reddit",
            Source::Twitter => "Twitter/X",
            Source::Weibo => "Weibo",
            Source::Zhihu => "Zhihu",
            Source::TechNews => "Tech News",
        }
    }

    pub fn parse(name: &str) -> Option<Source> {
        let name = name.trim().to_lowercase();
        Source::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KOL influence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KolTier {
    S,
    A,
    B,
}

impl KolTier {
    pub fn multiplier(&self) -> f64 {
        match self {
            KolTier::S => 3.0,
            KolTier::A => 2.0,
            KolTier::B => 1.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KolTier::S => "S",
            KolTier::A => "A",
            KolTier::B => "B",
        }
    }

    pub fn parse(tier: &str) -> Option<KolTier> {
        match tier.trim().to_uppercase().as_str() {
            "S" => Some(KolTier::S),
            "A" => Some(KolTier::A),
            "B" => Some(KolTier::B),
            _ => None,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One collected mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Platform-native post id (HN objectID, tweet id, feed entry id, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub source: Source,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_handle: String,
    #[serde(default)]
    pub engagement: u64,
    #[serde(default)]
    pub comments_count: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kol_tier: Option<KolTier>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentiment: String,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        source: Source,
        url: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let language = detect_language(&title).to_string();
        Self {
            id: String::new(),
            title,
            content: String::new(),
            source,
            url: url.into(),
            author: String::new(),
            author_handle: String::new(),
            engagement: 0,
            comments_count: 0,
            timestamp,
            tags: BTreeSet::new(),
            kol_tier: None,
            weight: default_weight(),
            language,
            summary: String::new(),
            sentiment: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.author_handle = handle.into();
        self
    }

    pub fn with_engagement(mut self, engagement: u64) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn with_comments(mut self, comments: u64) -> Self {
        self.comments_count = comments;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn is_kol(&self) -> bool {
        self.kol_tier.is_some()
    }

    /// Text the tagger and keyword filters look at.
    pub fn full_text(&self) -> String {
        if self.content.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.content)
        }
    }

    /// Own engagement scaled by the KOL weight. Used to pick fuzzy-cluster
    /// representatives.
    pub fn weighted_engagement(&self) -> f64 {
        self.engagement as f64 * self.weight
    }

    /// Check the structural invariants an item must satisfy before ranking.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.title.trim().is_empty() {
            return Err(ItemError::EmptyTitle {
                source: self.source,
                url: self.url.clone(),
            });
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ItemError::InvalidWeight {
                title: self.title.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }
}

/// A structurally invalid item, rejected before ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemError {
    EmptyTitle { source: Source, url: String },
    InvalidWeight { title: String, weight: f64 },
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemError::EmptyTitle { source, url } => {
                write!(f, "{} item has an empty title (url: '{}')", source, url)
            }
            ItemError::InvalidWeight { title, weight } => {
                write!(f, "item '{}' has invalid weight {}", title, weight)
            }
        }
    }
}

impl std::error::Error for ItemError {}

/// Rough language detection: more than 10% CJK characters means Chinese.
pub fn detect_language(text: &str) -> &'static str {
    let total = text.chars().count();
    if total == 0 {
        return "en";
    }
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    if cjk * 10 > total {
        "zh"
    } else {
        "en"
    }
}

/// Truncate to at most `max_chars` characters, appending "..." when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_source_round_trip_names() {
        for source in Source::ALL {
            assert_eq!(Source::parse(source.as_str()), Some(source));
        }
        assert_eq!(Source::parse(" Reddit "), Some(Source::Reddit));
        assert_eq!(Source::parse("mastodon"), None);
    }

    #[test]
    fn test_source_serializes_snake_case() {
        let json = serde_json::to_string(&Source::TechNews).unwrap();
        assert_eq!(json, "\"tech_news\"");
    }

    #[test]
    fn test_tier_multipliers() {
        assert_eq!(KolTier::S.multiplier(), 3.0);
        assert_eq!(KolTier::A.multiplier(), 2.0);
        assert_eq!(KolTier::B.multiplier(), 1.5);
        assert_eq!(KolTier::parse("a"), Some(KolTier::A));
        assert_eq!(KolTier::parse(""), None);
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let item = NewsItem::new("   ", Source::Reddit, "https://x.com", ts());
        assert!(matches!(item.validate(), Err(ItemError::EmptyTitle { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_weight() {
        let mut item = NewsItem::new("Claude ships", Source::Reddit, "", ts());
        item.weight = 0.0;
        assert!(matches!(
            item.validate(),
            Err(ItemError::InvalidWeight { .. })
        ));
        item.weight = f64::NAN;
        assert!(item.validate().is_err());
        item.weight = 1.5;
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal_item() {
        let json = r#"{"title":"Copilot update","source":"hackernews","timestamp":"2025-06-01T12:00:00Z"}"#;
        let item: NewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.weight, 1.0);
        assert!(item.url.is_empty());
        assert!(item.tags.is_empty());
        assert_eq!(item.kol_tier, None);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("Claude Code is great"), "en");
        assert_eq!(detect_language("Claude Code 新功能发布"), "zh");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("这是一个很长的标题", 4), "这是一个...");
    }
}
