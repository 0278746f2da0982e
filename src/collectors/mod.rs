//! Source collectors.
//!
//! Each collector turns one platform's search results into [`NewsItem`]s.
//! Fetching is kept separate from parsing: every collector exposes a pure
//! `parse_*` function over the raw response body so the mapping can be
//! tested without the network.

pub mod hackernews;
pub mod reddit;
pub mod tech_news;
pub mod twitter;
pub mod weibo_zhihu;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::api_error::{parse_api_error, ApiError};
use crate::config::{KolConfig, Settings};
use crate::model::{NewsItem, Source};
use crate::tagger::ProductTagger;

pub use hackernews::HackerNewsCollector;
pub use reddit::RedditCollector;
pub use tech_news::TechNewsCollector;
pub use twitter::TwitterCollector;
pub use weibo_zhihu::WeiboZhihuCollector;

/// Browser-like user agent for sites that reject unknown clients.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Collector names accepted by `--sources`, in default run order.
pub const COLLECTOR_NAMES: [&str; 5] = ["hackernews", "reddit", "twitter", "weibo_zhihu", "tech_news"];

#[async_trait]
pub trait Collector: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError>;
}

/// Build a collector by name. Unknown names give `None`.
pub fn collector_for(name: &str) -> Option<Box<dyn Collector>> {
    match name.trim().to_lowercase().as_str() {
        "hackernews" | "hn" => Some(Box::new(HackerNewsCollector)),
        "reddit" => Some(Box::new(RedditCollector)),
        "twitter" | "x" => Some(Box::new(TwitterCollector)),
        "weibo_zhihu" | "weibo" | "zhihu" => Some(Box::new(WeiboZhihuCollector)),
        "tech_news" => Some(Box::new(TechNewsCollector)),
        _ => None,
    }
}

/// Run a collector, logging failures instead of propagating them so one
/// broken source never aborts a run.
pub async fn safe_collect(collector: &dyn Collector, ctx: &CollectContext) -> Vec<NewsItem> {
    let name = collector.source_name();
    info!("Collecting [{}] ...", name);
    match collector.collect(ctx).await {
        Ok(items) => {
            info!("[{}] collected {} items", name, items.len());
            items
        }
        Err(e) => {
            error!("[{}] collection failed: {} (code: {})", name, e, e.code.as_str());
            if e.requires_user_action {
                error!("USER ACTION REQUIRED: {}", e.user_message);
            }
            Vec::new()
        }
    }
}

/// Everything a collector needs for one run.
pub struct CollectContext {
    pub client: Client,
    pub settings: Settings,
    pub kol: KolConfig,
    pub tagger: ProductTagger,
    pub lookback_days: u32,
    pub now: DateTime<Utc>,
    /// Items published before this instant are dropped.
    pub since: DateTime<Utc>,
}

impl CollectContext {
    pub fn new(settings: Settings, kol: KolConfig, lookback_days: u32) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_idle_timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::from_reqwest(&e))?;
        Ok(Self::with_client(client, settings, kol, lookback_days, Utc::now()))
    }

    pub fn with_client(
        client: Client,
        settings: Settings,
        kol: KolConfig,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let lookback_days = lookback_days.max(1);
        let tagger = ProductTagger::new(&settings.products);
        Self {
            client,
            settings,
            kol,
            tagger,
            lookback_days,
            now,
            since: now - Duration::days(i64::from(lookback_days)),
        }
    }

    pub fn keywords(&self) -> &[String] {
        self.tagger.keywords()
    }

    pub fn min_engagement(&self, source: Source) -> u64 {
        self.settings.collection.min_engagement_for(source)
    }

    pub fn max_items(&self) -> usize {
        self.settings.collection.max_items_per_source
    }

    pub fn is_recent(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.since
    }

    /// Keyword, engagement and lookback filters shared by every source.
    pub fn accepts(&self, item: &NewsItem) -> bool {
        self.tagger.matches_any(&item.full_text())
            && item.engagement >= self.min_engagement(item.source)
            && self.is_recent(item.timestamp)
    }

    /// Tag products, drop repeated hits of the same post, order by engagement
    /// and cap to the per-source limit. Distinct posts sharing a URL are kept
    /// for the ranking engine to merge.
    pub fn finish(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let mut seen = HashSet::new();
        let mut unique: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| item.id.is_empty() || seen.insert((item.source, item.id.clone())))
            .map(|mut item| {
                self.tagger.apply(&mut item);
                item
            })
            .collect();
        unique.sort_by(|a, b| b.engagement.cmp(&a.engagement));
        unique.truncate(self.max_items());
        unique
    }
}

/// Send a request and return the body of a successful response.
pub(crate) async fn fetch_text(request: RequestBuilder) -> Result<String, ApiError> {
    let response = request.send().await.map_err(|e| ApiError::from_reqwest(&e))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(parse_api_error(status, &body));
    }

    response.text().await.map_err(|e| ApiError::from_reqwest(&e))
}

pub(crate) async fn fetch_bytes(request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
    let response = request.send().await.map_err(|e| ApiError::from_reqwest(&e))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(parse_api_error(status, &body));
    }

    let bytes = response.bytes().await.map_err(|e| ApiError::from_reqwest(&e))?;
    Ok(bytes.to_vec())
}

/// Log a failed sub-request and keep going with the rest of the source.
pub(crate) fn log_partial_failure(source: &str, what: &str, err: &ApiError) {
    warn!("[{}] {} failed: {}", source, what, err);
}

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex");
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex");
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
    static ref SPACE_RE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Plain text from an HTML fragment: scripts, styles and tags removed,
/// common entities decoded, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&");

    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// First `max` characters of a string.
pub(crate) fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
