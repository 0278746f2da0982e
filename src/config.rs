// Configuration helpers - settings, KOL list and API keys
//
// Everything lives under one config directory ($LLM_NEWS_HOME or
// ~/.llm-news). Missing files resolve to defaults so a fresh checkout
// can run without any setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::{KolTier, Source};

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const TWITTER_TOKEN_VAR: &str = "TWITTER_BEARER_TOKEN";
pub const WEIBO_COOKIE_VAR: &str = "WEIBO_COOKIE";
pub const ZHIHU_COOKIE_VAR: &str = "ZHIHU_COOKIE";
pub const REDDIT_USER_AGENT_VAR: &str = "REDDIT_USER_AGENT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Product {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_products")]
    pub products: Vec<Product>,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub summarizer: SummarizerSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub sources: SourceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            products: default_products(),
            collection: CollectionSettings::default(),
            summarizer: SummarizerSettings::default(),
            output: OutputSettings::default(),
            sources: SourceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_max_items_per_source")]
    pub max_items_per_source: usize,
    #[serde(default = "default_max_items_per_report")]
    pub max_items_per_report: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64, // Title similarity (0.0-1.0) at which items merge
    #[serde(default = "default_min_engagement")]
    pub min_engagement: BTreeMap<String, u64>,
}

impl CollectionSettings {
    pub fn min_engagement_for(&self, source: Source) -> u64 {
        self.min_engagement
            .get(source.as_str())
            .copied()
            .unwrap_or(0)
    }
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            max_items_per_source: default_max_items_per_source(),
            max_items_per_report: default_max_items_per_report(),
            similarity_threshold: default_similarity_threshold(),
            min_engagement: default_min_engagement(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub hackernews: HackerNewsSettings,
    #[serde(default)]
    pub reddit: RedditSettings,
    #[serde(default)]
    pub tech_news: TechNewsSettings,
    /// Extra zhihu search terms searched before the product keywords.
    #[serde(default)]
    pub zhihu_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HackerNewsSettings {
    #[serde(default = "default_hn_min_score")]
    pub min_score: u64,
    #[serde(default = "default_hn_search_tags")]
    pub search_tags: Vec<String>,
}

impl Default for HackerNewsSettings {
    fn default() -> Self {
        Self {
            min_score: default_hn_min_score(),
            search_tags: default_hn_search_tags(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditSettings {
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            subreddits: default_subreddits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_language")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNewsSettings {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
}

impl Default for TechNewsSettings {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
        }
    }
}

fn default_products() -> Vec<Product> {
    vec![
        Product::new("Claude", &["Claude Code", "Claude", "Anthropic"]),
        Product::new("GitHub Copilot", &["GitHub Copilot", "Copilot"]),
        Product::new("Codex", &["OpenAI Codex", "Codex CLI", "Codex"]),
        Product::new("Cursor", &["Cursor IDE", "Cursor AI", "Cursor"]),
        Product::new("Windsurf", &["Windsurf", "Codeium"]),
    ]
}

fn default_lookback_days() -> u32 {
    1
}

fn default_max_items_per_source() -> usize {
    30
}

fn default_max_items_per_report() -> usize {
    50
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_min_engagement() -> BTreeMap<String, u64> {
    [("reddit", 10), ("twitter", 20), ("weibo", 50), ("zhihu", 10)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.3
}

fn default_batch_size() -> usize {
    10
}

fn default_report_dir() -> String {
    "reports".to_string()
}

fn default_hn_min_score() -> u64 {
    10
}

fn default_hn_search_tags() -> Vec<String> {
    vec!["story".to_string(), "show_hn".to_string(), "ask_hn".to_string()]
}

fn default_subreddits() -> Vec<String> {
    ["ClaudeAI", "ChatGPTCoding", "cursor", "GithubCopilot", "programming"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_feed_language() -> String {
    "en".to_string()
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource {
            name: "The Verge".to_string(),
            url: "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml".to_string(),
            language: default_feed_language(),
        },
        FeedSource {
            name: "TechCrunch".to_string(),
            url: "https://techcrunch.com/category/artificial-intelligence/feed/".to_string(),
            language: default_feed_language(),
        },
        FeedSource {
            name: "Ars Technica".to_string(),
            url: "https://feeds.arstechnica.com/arstechnica/technology-lab".to_string(),
            language: default_feed_language(),
        },
    ]
}

impl Settings {
    /// Update a single dotted setting from its string form (used by `config set`).
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "collection.lookback_days" => {
                self.collection.lookback_days = parse_setting(key, value)?;
            }
            "collection.max_items_per_source" => {
                self.collection.max_items_per_source = parse_setting(key, value)?;
            }
            "collection.max_items_per_report" => {
                self.collection.max_items_per_report = parse_setting(key, value)?;
            }
            "collection.similarity_threshold" => {
                let threshold: f64 = parse_setting(key, value)?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(format!(
                        "similarity_threshold must be between 0.0 and 1.0, got {}",
                        threshold
                    ));
                }
                self.collection.similarity_threshold = threshold;
            }
            "summarizer.model" => self.summarizer.model = value.to_string(),
            "summarizer.max_tokens" => {
                self.summarizer.max_tokens = parse_setting(key, value)?;
            }
            "summarizer.temperature" => {
                self.summarizer.temperature = parse_setting(key, value)?;
            }
            "summarizer.batch_size" => {
                let size: usize = parse_setting(key, value)?;
                if size == 0 {
                    return Err("batch_size must be at least 1".to_string());
                }
                self.summarizer.batch_size = size;
            }
            "output.report_dir" => self.output.report_dir = value.to_string(),
            _ => return Err(format!("Unknown setting: {}", key)),
        }
        Ok(())
    }
}

fn parse_setting<T>(key: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("Invalid value for {}: {}", key, e))
}

/// A known author whose posts get a weight boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KolEntry {
    pub handle: String,
    #[serde(default)]
    pub name: String,
    pub tier: KolTier,
}

/// Per-source KOL lists, as stored in kol_list.json.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KolConfig {
    #[serde(default)]
    pub hackernews: Vec<KolEntry>,
    #[serde(default)]
    pub reddit: Vec<KolEntry>,
    #[serde(default)]
    pub twitter: Vec<KolEntry>,
    #[serde(default)]
    pub weibo: Vec<KolEntry>,
    #[serde(default)]
    pub zhihu: Vec<KolEntry>,
    #[serde(default)]
    pub tech_news: Vec<KolEntry>,
}

impl KolConfig {
    pub fn entries(&self, source: Source) -> &[KolEntry] {
        match source {
            Source::Hackernews => &self.hackernews,
            Source::Reddit => &self.reddit,
            Source::Twitter => &self.twitter,
            Source::Weibo => &self.weibo,
            Source::Zhihu => &self.zhihu,
            Source::TechNews => &self.tech_news,
        }
    }

    pub fn total(&self) -> usize {
        Source::ALL.iter().map(|s| self.entries(*s).len()).sum()
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LLM_NEWS_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".llm-news")
}

pub fn ensure_config_dir() -> Result<PathBuf, String> {
    let config_dir = get_config_dir();
    std::fs::create_dir_all(&config_dir)
        .map_err(|e| format!("Failed to create config directory: {}", e))?;
    Ok(config_dir)
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

pub fn get_kol_list_path() -> PathBuf {
    get_config_dir().join("kol_list.json")
}

pub fn get_env_file_path() -> PathBuf {
    get_config_dir().join(".env")
}

// ============================================================================
// Settings
// ============================================================================

pub fn read_settings() -> Result<Settings, String> {
    read_settings_from(&get_settings_path())
}

pub fn read_settings_from(path: &Path) -> Result<Settings, String> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
}

pub fn write_settings(settings: &Settings) -> Result<(), String> {
    ensure_config_dir()?;
    write_settings_to(&get_settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), String> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
}

// ============================================================================
// KOL list
// ============================================================================

pub fn read_kol_config() -> Result<KolConfig, String> {
    read_kol_config_from(&get_kol_list_path())
}

pub fn read_kol_config_from(path: &Path) -> Result<KolConfig, String> {
    if !path.exists() {
        return Ok(KolConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read KOL list: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse KOL list: {}", e))
}

pub fn write_kol_config(config: &KolConfig) -> Result<(), String> {
    ensure_config_dir()?;
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize KOL list: {}", e))?;
    std::fs::write(get_kol_list_path(), content)
        .map_err(|e| format!("Failed to write KOL list: {}", e))
}

// ============================================================================
// Secrets (.env)
// ============================================================================

/// Look up a secret, preferring the process environment over the .env file.
pub fn read_env_value(key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(key) {
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }
    read_env_value_from(&get_env_file_path(), key)
}

pub fn read_env_value_from(env_path: &Path, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(env_path).ok()?;
    let prefix = format!("{}=", key);
    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix(&prefix)?.trim();
        // Remove quotes if present
        let value = value.trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub fn write_env_value_to(env_path: &Path, key: &str, value: &str) -> Result<(), String> {
    let prefix = format!("{}=", key);
    let mut lines: Vec<String> = Vec::new();
    let mut key_updated = false;

    if let Ok(content) = std::fs::read_to_string(env_path) {
        for line in content.lines() {
            if line.trim().starts_with(&prefix) {
                lines.push(format!("{}={}", key, value));
                key_updated = true;
            } else {
                lines.push(line.to_string());
            }
        }
    }

    if !key_updated {
        lines.push(format!("{}={}", key, value));
    }

    let content = lines.join("\n") + "\n";
    std::fs::write(env_path, content).map_err(|e| format!("Failed to write .env file: {}", e))?;

    // Owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(env_path, permissions);
    }

    Ok(())
}

pub fn remove_env_value_from(env_path: &Path, key: &str) -> Result<(), String> {
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return Ok(());
    };
    let prefix = format!("{}=", key);
    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().starts_with(&prefix))
        .collect();

    if lines.iter().all(|l| l.trim().is_empty()) {
        let _ = std::fs::remove_file(env_path);
        return Ok(());
    }
    std::fs::write(env_path, lines.join("\n") + "\n")
        .map_err(|e| format!("Failed to update .env file: {}", e))
}

pub fn read_api_key() -> Option<String> {
    read_env_value(API_KEY_VAR)
}

pub fn write_api_key(api_key: &str) -> Result<(), String> {
    ensure_config_dir()?;
    write_env_value_to(&get_env_file_path(), API_KEY_VAR, api_key)
}

pub fn delete_api_key() -> Result<(), String> {
    remove_env_value_from(&get_env_file_path(), API_KEY_VAR)
}

pub fn has_api_key() -> bool {
    read_api_key().is_some()
}

pub fn validate_api_key(api_key: &str) -> Result<(), String> {
    if api_key.is_empty() {
        return Err("API key cannot be empty".to_string());
    }

    if !api_key.starts_with("sk-ant-") {
        return Err("Invalid API key format. Anthropic API keys start with 'sk-ant-'".to_string());
    }

    Ok(())
}
