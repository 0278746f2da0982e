// Reddit collector using the public subreddit search JSON endpoints

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{fetch_text, log_partial_failure, take_chars, CollectContext, Collector};
use crate::api_error::{ApiError, ErrorCode};
use crate::config::{read_env_value, REDDIT_USER_AGENT_VAR};
use crate::model::{detect_language, NewsItem, Source};

const DEFAULT_USER_AGENT: &str = "llm-news/0.3";
/// Keywords searched per subreddit; the public endpoint is rate limited.
const KEYWORDS_PER_SUBREDDIT: usize = 8;
const RESULTS_PER_SEARCH: u32 = 10;

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    author: String,
}

/// Parse a subreddit search listing into filtered items.
pub fn parse_listing(body: &str, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
    let listing: Listing = serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse Reddit listing: {}", e),
        )
    })?;

    let items = listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let post = child.data;
            if post.title.trim().is_empty() {
                return None;
            }
            let timestamp = Utc
                .timestamp_opt(post.created_utc as i64, 0)
                .single()
                .unwrap_or(ctx.now);
            let url = if post.permalink.is_empty() {
                post.url
            } else {
                format!("https://www.reddit.com{}", post.permalink)
            };
            let content = take_chars(&post.selftext, 2000);
            let language = detect_language(&format!("{} {}", post.title, content));
            let handle = if post.author.is_empty() {
                String::new()
            } else {
                format!("u/{}", post.author)
            };

            let item = NewsItem::new(post.title, Source::Reddit, url, timestamp)
                .with_id(post.id)
                .with_content(content)
                .with_author(post.author)
                .with_handle(handle)
                .with_engagement(post.ups.max(0) as u64)
                .with_comments(post.num_comments)
                .with_language(language);

            ctx.accepts(&item).then_some(item)
        })
        .collect();

    Ok(items)
}

pub struct RedditCollector;

#[async_trait]
impl Collector for RedditCollector {
    fn source_name(&self) -> &'static str {
        "reddit"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
        let user_agent =
            read_env_value(REDDIT_USER_AGENT_VAR).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let window = if ctx.lookback_days <= 1 { "day" } else { "week" };
        let limit = RESULTS_PER_SEARCH.to_string();

        let mut items = Vec::new();
        for subreddit in &ctx.settings.sources.reddit.subreddits {
            let url = format!("https://www.reddit.com/r/{}/search.json", subreddit);
            for keyword in ctx.keywords().iter().take(KEYWORDS_PER_SUBREDDIT) {
                let request = ctx
                    .client
                    .get(&url)
                    .header("User-Agent", &user_agent)
                    .query(&[
                        ("q", keyword.as_str()),
                        ("restrict_sr", "on"),
                        ("sort", "relevance"),
                        ("t", window),
                        ("limit", limit.as_str()),
                    ]);

                let result = fetch_text(request)
                    .await
                    .and_then(|body| parse_listing(&body, ctx));
                match result {
                    Ok(posts) => {
                        debug!("r/{} '{}': {} posts", subreddit, keyword, posts.len());
                        items.extend(posts);
                    }
                    Err(e) => log_partial_failure(
                        self.source_name(),
                        &format!("r/{} search '{}'", subreddit, keyword),
                        &e,
                    ),
                }
            }
        }

        Ok(ctx.finish(items))
    }
}
