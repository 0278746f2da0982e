// Twitter/X collector using the API v2 recent search and user timelines.
// Requires a bearer token; without one the source is skipped.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{fetch_text, log_partial_failure, take_chars, CollectContext, Collector};
use crate::api_error::{ApiError, ErrorCode};
use crate::config::{read_env_value, KolEntry, TWITTER_TOKEN_VAR};
use crate::kol::normalize_handle;
use crate::model::{NewsItem, Source};

const API_BASE: &str = "https://api.twitter.com/2";
const KEYWORDS_PER_QUERY: usize = 5;
const MAX_QUERIES: usize = 3;
const MAX_KOL_TIMELINES: usize = 15;
const TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct TweetResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    public_metrics: Metrics,
}

#[derive(Debug, Default, Deserialize)]
struct Metrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<User>,
}

fn parse_response(body: &str) -> Result<TweetResponse, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse Twitter response: {}", e),
        )
    })
}

fn tweet_item(tweet: Tweet, name: &str, username: &str, now: DateTime<Utc>) -> NewsItem {
    let timestamp = tweet
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    let url = format!("https://twitter.com/{}/status/{}", username, tweet.id);
    let id = tweet.id.clone();
    let author = if name.is_empty() { username } else { name };

    let mut item = NewsItem::new(take_chars(&tweet.text, TITLE_CHARS), Source::Twitter, url, timestamp)
        .with_id(id)
        .with_content(tweet.text)
        .with_author(author)
        .with_handle(format!("@{}", username))
        .with_engagement(tweet.public_metrics.like_count)
        .with_comments(tweet.public_metrics.reply_count);
    if let Some(lang) = tweet.lang.filter(|l| !l.is_empty()) {
        item.language = lang;
    }
    item
}

/// Parse a recent-search response. Authors are resolved from `includes.users`.
pub fn parse_search_response(body: &str, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
    let response = parse_response(body)?;
    let users: HashMap<String, User> = response
        .includes
        .users
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let items = response
        .data
        .into_iter()
        .filter_map(|tweet| {
            let (name, username) = users
                .get(&tweet.author_id)
                .map(|u| (u.name.clone(), u.username.clone()))
                .unwrap_or_default();
            let item = tweet_item(tweet, &name, &username, ctx.now);
            ctx.accepts(&item).then_some(item)
        })
        .collect();

    Ok(items)
}

/// Parse a KOL timeline. The author and tier come from the KOL entry and the
/// engagement floor does not apply.
pub fn parse_timeline(
    body: &str,
    kol: &KolEntry,
    ctx: &CollectContext,
) -> Result<Vec<NewsItem>, ApiError> {
    let response = parse_response(body)?;
    let username = normalize_handle(&kol.handle);

    let items = response
        .data
        .into_iter()
        .map(|tweet| {
            let mut item = tweet_item(tweet, &kol.name, &username, ctx.now);
            item.kol_tier = Some(kol.tier);
            item
        })
        .filter(|item| ctx.tagger.matches_any(&item.full_text()) && ctx.is_recent(item.timestamp))
        .collect();

    Ok(items)
}

/// Search queries with up to five quoted keywords each.
pub fn build_queries(keywords: &[String]) -> Vec<String> {
    keywords
        .chunks(KEYWORDS_PER_QUERY)
        .take(MAX_QUERIES)
        .map(|group| {
            let terms: Vec<String> = group.iter().map(|k| format!("\"{}\"", k)).collect();
            format!("({}) -is:retweet lang:en", terms.join(" OR "))
        })
        .collect()
}

pub struct TwitterCollector;

impl TwitterCollector {
    async fn kol_timeline(
        &self,
        ctx: &CollectContext,
        token: &str,
        kol: &KolEntry,
        start_time: &str,
    ) -> Result<Vec<NewsItem>, ApiError> {
        let username = normalize_handle(&kol.handle);
        let request = ctx
            .client
            .get(format!("{}/users/by/username/{}", API_BASE, username))
            .bearer_auth(token);
        let body = fetch_text(request).await?;
        let lookup: UserLookup = serde_json::from_str(&body).map_err(|e| {
            ApiError::new(ErrorCode::ParseError, format!("Failed to parse user lookup: {}", e))
        })?;
        let Some(user) = lookup.data else {
            return Ok(Vec::new());
        };

        let request = ctx
            .client
            .get(format!("{}/users/{}/tweets", API_BASE, user.id))
            .bearer_auth(token)
            .query(&[
                ("max_results", "10"),
                ("start_time", start_time),
                ("tweet.fields", "created_at,public_metrics,lang"),
                ("exclude", "retweets"),
            ]);
        let body = fetch_text(request).await?;
        parse_timeline(&body, kol, ctx)
    }
}

#[async_trait]
impl Collector for TwitterCollector {
    fn source_name(&self) -> &'static str {
        "twitter"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
        let Some(token) = read_env_value(TWITTER_TOKEN_VAR) else {
            warn!(
                "{} not configured, skipping Twitter (apply at https://developer.twitter.com/en/portal)",
                TWITTER_TOKEN_VAR
            );
            return Ok(Vec::new());
        };

        let start_time = ctx.since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut items = Vec::new();

        for query in build_queries(ctx.keywords()) {
            let request = ctx
                .client
                .get(format!("{}/tweets/search/recent", API_BASE))
                .bearer_auth(&token)
                .query(&[
                    ("query", query.as_str()),
                    ("max_results", "20"),
                    ("start_time", start_time.as_str()),
                    ("tweet.fields", "created_at,public_metrics,author_id,lang"),
                    ("user.fields", "name,username"),
                    ("expansions", "author_id"),
                    ("sort_order", "relevancy"),
                ]);

            let result = fetch_text(request)
                .await
                .and_then(|body| parse_search_response(&body, ctx));
            match result {
                Ok(tweets) => {
                    debug!("Query {} matched {} tweets", query, tweets.len());
                    items.extend(tweets);
                }
                Err(e) => {
                    // A bad token fails every request the same way.
                    if e.requires_user_action {
                        return Err(e);
                    }
                    log_partial_failure(self.source_name(), "search", &e);
                }
            }
        }

        for kol in ctx.kol.twitter.iter().take(MAX_KOL_TIMELINES) {
            match self.kol_timeline(ctx, &token, kol, &start_time).await {
                Ok(tweets) => items.extend(tweets),
                Err(e) => log_partial_failure(
                    self.source_name(),
                    &format!("timeline @{}", normalize_handle(&kol.handle)),
                    &e,
                ),
            }
        }

        Ok(ctx.finish(items))
    }
}
