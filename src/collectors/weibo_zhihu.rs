// Weibo and Zhihu collector.
//
// Both platforms are searched through their public JSON endpoints. Login
// cookies (WEIBO_COOKIE / ZHIHU_COOKIE) are optional but unlock more results.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    fetch_text, log_partial_failure, strip_html, take_chars, CollectContext, Collector,
    BROWSER_USER_AGENT,
};
use crate::api_error::{ApiError, ErrorCode};
use crate::config::{read_env_value, KolEntry, WEIBO_COOKIE_VAR, ZHIHU_COOKIE_VAR};
use crate::model::{NewsItem, Source};

const WEIBO_API: &str = "https://m.weibo.cn/api/container/getIndex";
const ZHIHU_API: &str = "https://www.zhihu.com/api/v4/search_v3";
const WEIBO_KEYWORDS: usize = 8;
const ZHIHU_KEYWORDS: usize = 5;
const ZHIHU_MAX_QUERIES: usize = 10;
const WEIBO_POST_CARD: i64 = 9;
const CHINA_UTC_OFFSET_SECS: i32 = 8 * 3600;

lazy_static! {
    static ref MINUTES_AGO: Regex = Regex::new(r"(\d+)\s*分钟前").expect("valid regex");
    static ref HOURS_AGO: Regex = Regex::new(r"(\d+)\s*小时前").expect("valid regex");
    static ref TODAY: Regex = Regex::new(r"今天\s*(\d{1,2}):(\d{2})").expect("valid regex");
    static ref YESTERDAY: Regex = Regex::new(r"昨天\s*(\d{1,2}):(\d{2})").expect("valid regex");
    static ref FULL_DATE: Regex = Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid regex");
    static ref MONTH_DAY: Regex = Regex::new(r"(\d{1,2})-(\d{1,2})").expect("valid regex");
}

/// Weibo shows times in China Standard Time.
fn china_offset() -> FixedOffset {
    FixedOffset::east_opt(CHINA_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn capture_u32(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn china_local(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    china_offset()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse Weibo's display timestamps: `刚刚`, `N分钟前`, `N小时前`,
/// `今天 HH:MM`, `昨天 HH:MM`, `YYYY-MM-DD`, `MM-DD`, and the API's
/// `Mon Jun 02 10:00:00 +0800 2025` form. Unparseable input gives `now`.
pub fn parse_weibo_time(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = text.trim();
    if text.is_empty() || text.contains("刚刚") {
        return now;
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%a %b %d %H:%M:%S %z %Y") {
        return dt.with_timezone(&Utc);
    }
    // Out-of-range offsets fall back to `now`.
    if let Some(minutes) = MINUTES_AGO.captures(text).and_then(|c| capture_u32(&c, 1)) {
        return Duration::try_minutes(i64::from(minutes))
            .and_then(|ago| now.checked_sub_signed(ago))
            .unwrap_or(now);
    }
    if let Some(hours) = HOURS_AGO.captures(text).and_then(|c| capture_u32(&c, 1)) {
        return Duration::try_hours(i64::from(hours))
            .and_then(|ago| now.checked_sub_signed(ago))
            .unwrap_or(now);
    }

    let today = now.with_timezone(&china_offset()).date_naive();
    let clock = |re: &Regex, date: NaiveDate| {
        let caps = re.captures(text)?;
        china_local(date, capture_u32(&caps, 1)?, capture_u32(&caps, 2)?)
    };
    if let Some(dt) = clock(&*TODAY, today) {
        return dt;
    }
    if let Some(dt) = today.pred_opt().and_then(|yesterday| clock(&*YESTERDAY, yesterday)) {
        return dt;
    }

    let date = if let Some(caps) = FULL_DATE.captures(text) {
        caps.get(1)
            .and_then(|y| y.as_str().parse::<i32>().ok())
            .zip(capture_u32(&caps, 2).zip(capture_u32(&caps, 3)))
            .and_then(|(y, (m, d))| NaiveDate::from_ymd_opt(y, m, d))
    } else {
        MONTH_DAY.captures(text).and_then(|caps| {
            NaiveDate::from_ymd_opt(
                today.year(),
                capture_u32(&caps, 1)?,
                capture_u32(&caps, 2)?,
            )
        })
    };

    date.and_then(|d| china_local(d, 0, 0)).unwrap_or(now)
}

/// Numeric or string ids as a string.
fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// Weibo
// ============================================================================

#[derive(Debug, Deserialize)]
struct WeiboResponse {
    #[serde(default)]
    data: WeiboData,
}

#[derive(Debug, Default, Deserialize)]
struct WeiboData {
    #[serde(default)]
    cards: Vec<WeiboCard>,
}

#[derive(Debug, Deserialize)]
struct WeiboCard {
    #[serde(default)]
    card_type: i64,
    #[serde(default)]
    mblog: Option<Mblog>,
}

#[derive(Debug, Deserialize)]
struct Mblog {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    reposts_count: u64,
    #[serde(default)]
    comments_count: u64,
    #[serde(default)]
    attitudes_count: u64,
    #[serde(default)]
    user: Option<WeiboUser>,
}

#[derive(Debug, Deserialize)]
struct WeiboUser {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    screen_name: String,
}

fn weibo_posts(body: &str) -> Result<Vec<Mblog>, ApiError> {
    let response: WeiboResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse Weibo response: {}", e),
        )
    })?;
    Ok(response
        .data
        .cards
        .into_iter()
        .filter(|card| card.card_type == WEIBO_POST_CARD)
        .filter_map(|card| card.mblog)
        .collect())
}

fn weibo_item(post: Mblog, now: DateTime<Utc>) -> Option<NewsItem> {
    let text = strip_html(&post.text);
    if text.is_empty() {
        return None;
    }
    let (author, uid) = post
        .user
        .map(|u| (u.screen_name, id_string(&u.id)))
        .unwrap_or_default();
    let mid = id_string(&post.id);
    let url = format!("https://m.weibo.cn/detail/{}", mid);
    let handle = if uid.is_empty() { String::new() } else { format!("uid:{}", uid) };

    Some(
        NewsItem::new(take_chars(&text, 100), Source::Weibo, url, parse_weibo_time(&post.created_at, now))
            .with_id(mid)
            .with_content(take_chars(&text, 2000))
            .with_author(author)
            .with_handle(handle)
            .with_engagement(post.attitudes_count.saturating_add(post.reposts_count))
            .with_comments(post.comments_count)
            .with_language("zh"),
    )
}

/// Parse a Weibo keyword search. Only post cards (`card_type` 9) are kept.
pub fn parse_weibo_search(body: &str, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
    Ok(weibo_posts(body)?
        .into_iter()
        .filter_map(|post| weibo_item(post, ctx.now))
        .filter(|item| ctx.accepts(item))
        .collect())
}

/// Parse a KOL's own timeline. Author and tier come from the KOL entry.
pub fn parse_weibo_timeline(
    body: &str,
    kol: &KolEntry,
    ctx: &CollectContext,
) -> Result<Vec<NewsItem>, ApiError> {
    Ok(weibo_posts(body)?
        .into_iter()
        .filter_map(|post| weibo_item(post, ctx.now))
        .map(|mut item| {
            if !kol.name.is_empty() {
                item.author = kol.name.clone();
            }
            item.kol_tier = Some(kol.tier);
            item
        })
        .filter(|item| ctx.tagger.matches_any(&item.full_text()) && ctx.is_recent(item.timestamp))
        .collect())
}

/// Numeric Weibo user id of a KOL entry (`uid:123` or `123`).
fn weibo_uid(kol: &KolEntry) -> Option<&str> {
    let handle = kol.handle.trim();
    let uid = handle.strip_prefix("uid:").unwrap_or(handle);
    (!uid.is_empty() && uid.chars().all(|c| c.is_ascii_digit())).then_some(uid)
}

// ============================================================================
// Zhihu
// ============================================================================

#[derive(Debug, Deserialize)]
struct ZhihuResponse {
    #[serde(default)]
    data: Vec<ZhihuResult>,
}

#[derive(Debug, Deserialize)]
struct ZhihuResult {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    object: Option<ZhihuObject>,
}

#[derive(Debug, Deserialize)]
struct ZhihuObject {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    voteup_count: u64,
    #[serde(default)]
    comment_count: u64,
    #[serde(default)]
    created_time: Option<i64>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    question: Option<ZhihuQuestion>,
    #[serde(default)]
    author: Option<ZhihuAuthor>,
}

#[derive(Debug, Deserialize)]
struct ZhihuQuestion {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ZhihuAuthor {
    #[serde(default)]
    name: String,
}

/// Parse a Zhihu `search_v3` response. Answers, articles and videos are kept.
pub fn parse_zhihu_search(body: &str, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
    let response: ZhihuResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            ErrorCode::ParseError,
            format!("Failed to parse Zhihu response: {}", e),
        )
    })?;

    let items = response
        .data
        .into_iter()
        .filter(|r| matches!(r.kind.as_str(), "answer" | "article" | "zvideo"))
        .filter_map(|r| {
            let obj = r.object?;
            let question_title = obj.question.as_ref().map(|q| q.name.clone()).unwrap_or_default();
            let title = strip_html(if question_title.is_empty() { &obj.title } else { &question_title });
            let content = if obj.excerpt.is_empty() {
                strip_html(&take_chars(&obj.content, 500))
            } else {
                strip_html(&obj.excerpt)
            };

            let url = match r.kind.as_str() {
                "answer" => format!(
                    "https://www.zhihu.com/question/{}/answer/{}",
                    obj.question.as_ref().map(|q| id_string(&q.id)).unwrap_or_default(),
                    id_string(&obj.id)
                ),
                "article" => format!("https://zhuanlan.zhihu.com/p/{}", id_string(&obj.id)),
                _ => obj.url.clone(),
            };

            let timestamp = obj
                .created_time
                .or(obj.created)
                .filter(|ts| *ts > 0)
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .unwrap_or(ctx.now);

            let title = if title.is_empty() {
                take_chars(&content, 100)
            } else {
                take_chars(&title, 200)
            };
            if title.trim().is_empty() {
                return None;
            }

            let item = NewsItem::new(title, Source::Zhihu, url, timestamp)
                .with_id(format!("{}:{}", r.kind, id_string(&obj.id)))
                .with_content(take_chars(&content, 2000))
                .with_author(obj.author.map(|a| a.name).unwrap_or_default())
                .with_engagement(obj.voteup_count)
                .with_comments(obj.comment_count)
                .with_language("zh");

            ctx.accepts(&item).then_some(item)
        })
        .collect();

    Ok(items)
}

pub struct WeiboZhihuCollector;

impl WeiboZhihuCollector {
    async fn collect_weibo(&self, ctx: &CollectContext) -> Vec<NewsItem> {
        let cookie = read_env_value(WEIBO_COOKIE_VAR);
        if cookie.is_none() {
            info!("{} not configured, using public Weibo search (limited)", WEIBO_COOKIE_VAR);
        }
        let request = |params: &[(&str, String)]| {
            let mut request = ctx
                .client
                .get(WEIBO_API)
                .header("User-Agent", BROWSER_USER_AGENT)
                .header("Accept", "application/json, text/plain, */*")
                .header("Referer", "https://m.weibo.cn/")
                .query(params);
            if let Some(cookie) = &cookie {
                request = request.header("Cookie", cookie);
            }
            request
        };

        let mut items = Vec::new();
        for keyword in ctx.keywords().iter().take(WEIBO_KEYWORDS) {
            let params = [
                ("containerid", format!("100103type=1&q={}", keyword)),
                ("page_type", "searchall".to_string()),
            ];
            let result = fetch_text(request(&params))
                .await
                .and_then(|body| parse_weibo_search(&body, ctx));
            match result {
                Ok(posts) => {
                    debug!("Weibo '{}': {} posts", keyword, posts.len());
                    items.extend(posts);
                }
                Err(e) => log_partial_failure(self.source_name(), &format!("weibo search '{}'", keyword), &e),
            }
        }

        for kol in &ctx.kol.weibo {
            let Some(uid) = weibo_uid(kol) else {
                continue;
            };
            let params = [
                ("containerid", format!("107603{}", uid)),
                ("page", "1".to_string()),
            ];
            let result = fetch_text(request(&params))
                .await
                .and_then(|body| parse_weibo_timeline(&body, kol, ctx));
            match result {
                Ok(posts) => items.extend(posts),
                Err(e) => log_partial_failure(self.source_name(), &format!("weibo KOL {}", kol.name), &e),
            }
        }

        items
    }

    async fn collect_zhihu(&self, ctx: &CollectContext) -> Vec<NewsItem> {
        let cookie = read_env_value(ZHIHU_COOKIE_VAR);
        let queries: Vec<&str> = ctx
            .settings
            .sources
            .zhihu_topics
            .iter()
            .chain(ctx.keywords().iter().take(ZHIHU_KEYWORDS))
            .map(String::as_str)
            .take(ZHIHU_MAX_QUERIES)
            .collect();

        let mut items = Vec::new();
        for query in queries {
            let mut request = ctx
                .client
                .get(ZHIHU_API)
                .header("User-Agent", BROWSER_USER_AGENT)
                .header("Referer", "https://www.zhihu.com/")
                .query(&[("type", "content"), ("q", query), ("limit", "10"), ("offset", "0")]);
            if let Some(cookie) = &cookie {
                request = request.header("Cookie", cookie);
            }

            let result = fetch_text(request)
                .await
                .and_then(|body| parse_zhihu_search(&body, ctx));
            match result {
                Ok(results) => {
                    debug!("Zhihu '{}': {} results", query, results.len());
                    items.extend(results);
                }
                Err(e) => log_partial_failure(self.source_name(), &format!("zhihu search '{}'", query), &e),
            }
        }

        items
    }
}

#[async_trait]
impl Collector for WeiboZhihuCollector {
    fn source_name(&self) -> &'static str {
        "weibo_zhihu"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Vec<NewsItem>, ApiError> {
        let mut items = self.collect_weibo(ctx).await;
        items.extend(self.collect_zhihu(ctx).await);
        Ok(ctx.finish(items))
    }
}
