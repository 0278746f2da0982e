// Tech news collector: RSS/Atom feeds from configured outlets

use async_trait::async_trait;
use tracing::debug;

use super::{fetch_bytes, log_partial_failure, strip_html, take_chars, CollectContext, Collector, BROWSER_USER_AGENT};
use crate::api_error::{collector_error, ApiError, ErrorCode};
use crate::config::FeedSource;
use crate::model::{NewsItem, Source};

/// Entries read per feed.
const MAX_ENTRIES_PER_FEED: usize = 30;

/// Parse an RSS/Atom feed body into filtered items. The feed's display name
/// stands in for entries without an author.
pub fn parse_feed(
    bytes: &[u8],
    feed: &FeedSource,
    ctx: &CollectContext,
) -> Result<Vec<NewsItem>, ApiError> {
    let parsed = feed_rs::parser::parse(bytes).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse RSS/Atom feed '{}': {}", feed.name, e),
        )
    })?;

    let items = parsed
        .entries
        .into_iter()
        .take(MAX_ENTRIES_PER_FEED)
        .filter_map(|entry| {
            let title = entry.title.map(|t| strip_html(&t.content)).unwrap_or_default();
            if title.is_empty() {
                return None;
            }
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
                .unwrap_or_default();

            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .unwrap_or_default();
            let content = take_chars(&strip_html(&body), 2000);

            let timestamp = entry.published.or(entry.updated).unwrap_or(ctx.now);
            let author = entry
                .authors
                .first()
                .map(|p| p.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| feed.name.clone());

            let item = NewsItem::new(title, Source::TechNews, url, timestamp)
                .with_id(entry.id)
                .with_content(content)
                .with_author(author)
                .with_language(feed.language.clone());

            ctx.accepts(&item).then_some(item)
        })
        .collect();

    Ok(items)
}

pub struct TechNewsCollector;

#[async_trait]
impl Collector for TechNewsCollector {
    fn source_name(&self) -> &'static str {
        "tech_news"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
        let feeds = &ctx.settings.sources.tech_news.feeds;
        let mut items = Vec::new();
        let mut failed = 0;
        for feed in feeds {
            let request = ctx.client.get(&feed.url).header("User-Agent", BROWSER_USER_AGENT);
            let result = fetch_bytes(request)
                .await
                .and_then(|bytes| parse_feed(&bytes, feed, ctx));
            match result {
                Ok(entries) => {
                    debug!("[{}] {} matching entries", feed.name, entries.len());
                    items.extend(entries);
                }
                Err(e) => {
                    failed += 1;
                    log_partial_failure(self.source_name(), &format!("feed '{}'", feed.name), &e);
                }
            }
        }
        if !feeds.is_empty() && failed == feeds.len() {
            return Err(collector_error(self.source_name(), "every feed failed"));
        }

        // Feeds carry no engagement; newest first before the shared cap.
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(ctx.finish(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::context;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Tech</title>
    <link>https://tech.example.com</link>
    <description>AI news</description>
    <item>
      <title>Anthropic launches Claude Code on the web</title>
      <link>https://tech.example.com/claude-code-web</link>
      <description>&lt;p&gt;The &lt;b&gt;agentic&lt;/b&gt; coding tool moves to the browser.&lt;/p&gt;</description>
      <pubDate>Mon, 02 Jun 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Smartphone sales slow down</title>
      <link>https://tech.example.com/phones</link>
      <pubDate>Mon, 02 Jun 2025 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Cursor raises again</title>
      <link>https://tech.example.com/cursor-old</link>
      <pubDate>Mon, 19 May 2025 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    fn feed() -> FeedSource {
        FeedSource {
            name: "Example Tech".to_string(),
            url: "https://tech.example.com/feed".to_string(),
            language: "en".to_string(),
        }
    }

    #[test]
    fn test_parse_rss_feed() {
        let ctx = context();
        let items = parse_feed(RSS.as_bytes(), &feed(), &ctx).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.source, Source::TechNews);
        assert_eq!(item.url, "https://tech.example.com/claude-code-web");
        assert_eq!(item.author, "Example Tech");
        assert_eq!(item.content, "The agentic coding tool moves to the browser.");
        assert_eq!(item.engagement, 0);
    }

    #[test]
    fn test_parse_atom_feed() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:uuid:feed</id>
  <updated>2025-06-02T10:00:00Z</updated>
  <entry>
    <title>GitHub Copilot adds code review</title>
    <id>https://atom.example.com/copilot-review</id>
    <updated>2025-06-02T10:00:00Z</updated>
    <author><name>Jane Reporter</name></author>
    <summary>Copilot can now review pull requests.</summary>
  </entry>
</feed>"#;
        let ctx = context();
        let items = parse_feed(atom.as_bytes(), &feed(), &ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].author, "Jane Reporter");
        assert_eq!(items[0].url, "https://atom.example.com/copilot-review");
    }

    #[test]
    fn test_invalid_feed() {
        let ctx = context();
        let err = parse_feed(b"not a feed", &feed(), &ctx).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }
}
