// Hacker News collector using the public Algolia search API (no key needed)

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{fetch_text, log_partial_failure, CollectContext, Collector};
use crate::api_error::{ApiError, ErrorCode};
use crate::model::{detect_language, NewsItem, Source};

const SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search";
const HITS_PER_PAGE: u32 = 20;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    story_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "objectID", default)]
    object_id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    points: Option<u64>,
    #[serde(default)]
    num_comments: Option<u64>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    created_at_i: Option<i64>,
}

impl Hit {
    fn timestamp(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                self.created_at_i
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            })
            .unwrap_or(fallback)
    }
}

/// Parse an Algolia search response into filtered items.
pub fn parse_search_response(body: &str, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
    let response: SearchResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse Hacker News response: {}", e),
        )
    })?;

    let items = response
        .hits
        .into_iter()
        .filter_map(|hit| {
            let title = hit.title.clone().unwrap_or_default();
            if title.trim().is_empty() {
                return None;
            }
            let url = hit
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", hit.object_id));
            let content = hit
                .story_text
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(super::strip_html)
                .unwrap_or_else(|| title.clone());
            let author = hit.author.clone().unwrap_or_default();
            let language = detect_language(&format!("{} {}", title, content));

            let item = NewsItem::new(title, Source::Hackernews, url, hit.timestamp(ctx.now))
                .with_id(hit.object_id.clone())
                .with_content(content)
                .with_handle(author.clone())
                .with_author(author)
                .with_engagement(hit.points.unwrap_or(0))
                .with_comments(hit.num_comments.unwrap_or(0))
                .with_language(language);

            ctx.accepts(&item).then_some(item)
        })
        .collect();

    Ok(items)
}

pub struct HackerNewsCollector;

#[async_trait]
impl Collector for HackerNewsCollector {
    fn source_name(&self) -> &'static str {
        "hackernews"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
        let hn = &ctx.settings.sources.hackernews;
        let tags = format!("({})", hn.search_tags.join(","));
        let numeric_filters = format!(
            "created_at_i>{},points>{}",
            ctx.since.timestamp(),
            hn.min_score
        );

        let hits_per_page = HITS_PER_PAGE.to_string();

        let mut items = Vec::new();
        for keyword in ctx.keywords() {
            let request = ctx.client.get(SEARCH_URL).query(&[
                ("query", keyword.as_str()),
                ("tags", tags.as_str()),
                ("numericFilters", numeric_filters.as_str()),
                ("hitsPerPage", hits_per_page.as_str()),
            ]);

            let result = fetch_text(request)
                .await
                .and_then(|body| parse_search_response(&body, ctx));
            match result {
                Ok(hits) => {
                    debug!("Keyword '{}' matched {} stories", keyword, hits.len());
                    items.extend(hits);
                }
                Err(e) => log_partial_failure(self.source_name(), &format!("search '{}'", keyword), &e),
            }

            if items.len() >= ctx.max_items() {
                break;
            }
        }

        Ok(ctx.finish(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::context;

    const FIXTURE: &str = r#"{
        "hits": [
            {
                "title": "Claude Code now supports background agents",
                "url": "https://www.anthropic.com/news/agents",
                "objectID": "401",
                "author": "pg",
                "points": 312,
                "num_comments": 140,
                "created_at": "2025-06-02T08:15:00.000Z"
            },
            {
                "title": "Ask HN: Is Cursor worth it?",
                "story_text": "<p>I have been using <i>Cursor</i> for a month</p>",
                "url": null,
                "objectID": "402",
                "author": "someone",
                "points": 45,
                "num_comments": 80,
                "created_at_i": 1748851200
            },
            {
                "title": "Show HN: A new Rust web framework",
                "url": "https://example.com/fw",
                "objectID": "403",
                "points": 99,
                "created_at": "2025-06-02T09:00:00Z"
            },
            {
                "title": "Copilot outage postmortem",
                "url": "https://github.blog/outage",
                "objectID": "404",
                "points": 88,
                "created_at": "2025-05-20T09:00:00Z"
            }
        ]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let ctx = context();
        let items = parse_search_response(FIXTURE, &ctx).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.source, Source::Hackernews);
        assert_eq!(first.id, "401");
        assert_eq!(first.engagement, 312);
        assert_eq!(first.comments_count, 140);
        assert_eq!(first.author, "pg");
        assert_eq!(first.content, first.title);
    }

    #[test]
    fn test_missing_url_links_to_discussion() {
        let ctx = context();
        let items = parse_search_response(FIXTURE, &ctx).unwrap();
        assert_eq!(items[1].url, "https://news.ycombinator.com/item?id=402");
        assert_eq!(items[1].content, "I have been using Cursor for a month");
        assert_eq!(items[1].timestamp.timestamp(), 1748851200);
    }

    #[test]
    fn test_invalid_body_is_parse_error() {
        let ctx = context();
        let err = parse_search_response("<html>", &ctx).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn test_empty_hits() {
        let ctx = context();
        assert!(parse_search_response("{}", &ctx).unwrap().is_empty());
    }
}
