//! LLM summaries via the Anthropic Messages API.
//!
//! Two kinds of calls are made per run: one daily digest over the ranked
//! list, and batched one-line summaries with a sentiment label per item.
//! Any failure degrades to fallback text so a report is always produced.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::api_error::{parse_api_error, ApiError, ErrorCode};
use crate::config::SummarizerSettings;
use crate::dedup::RankedItem;
use crate::model::truncate_chars;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Items included in the daily digest prompt.
pub const MAX_DIGEST_ITEMS: usize = 50;

const NO_ITEMS_SUMMARY: &str = "No relevant items were collected today.";

const DAILY_SUMMARY_PROMPT: &str = "\
You are an industry analyst covering AI coding tools. Using only the items \
below, collected from social media and tech news, write a structured daily \
digest in Markdown.

## Collected items

{items}

## Sections

### 1. Top stories
The 2-3 most important developments, one or two sentences each, naming the \
product and source.

### 2. Product updates
For each product mentioned (Claude, GitHub Copilot, Codex, Cursor, Windsurf, \
...): new features, user feedback, known issues or controversy.

### 3. KOL views
Key opinions from items marked [KOL]: who said what (short quote) and their \
position.

### 4. Trends
Signals across all items, notable shifts, and advice for developers.

### 5. Sentiment
A short positive/neutral/negative read for each major product.

Stay objective and do not invent information. If a section has no data, \
write \"No data\".";

const BATCH_PROMPT_HEADER: &str = "\
For each item below write a one-sentence summary (at most 30 words) and \
classify its sentiment as positive, neutral or negative.\n\n";

const BATCH_PROMPT_FOOTER: &str = "\
Reply with a JSON array only, one element per item with the fields index, \
summary and sentiment.
Example: [{\"index\": 1, \"summary\": \"...\", \"sentiment\": \"positive\"}]";

/// Text used in place of the digest when no LLM is available.
pub fn fallback_summary() -> &'static str {
    "> LLM summary unavailable: ANTHROPIC_API_KEY is not configured or the call failed.\n\
     > Run `llm-news config api-key set <key>` to enable summaries.\n\n\
     See the per-product and per-source sections below for the collected items."
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    index: usize,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    sentiment: String,
}

pub struct Summarizer {
    client: Client,
    api_key: String,
    settings: SummarizerSettings,
}

impl Summarizer {
    pub fn new(api_key: String, settings: SummarizerSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::from_reqwest(&e))?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    /// Generate the digest over the top ranked items.
    pub async fn daily_summary(&self, items: &[RankedItem]) -> Result<String, ApiError> {
        if items.is_empty() {
            return Ok(NO_ITEMS_SUMMARY.to_string());
        }
        info!(
            "Generating daily summary over {} items with {}",
            items.len().min(MAX_DIGEST_ITEMS),
            self.settings.model
        );
        self.complete(build_daily_prompt(items)).await
    }

    /// Fill `summary` and `sentiment` on every item, in batches. A batch whose
    /// reply cannot be used falls back to title prefixes.
    pub async fn summarize_items(&self, items: &mut [RankedItem]) {
        let batch_size = self.settings.batch_size.max(1);
        for (n, batch) in items.chunks_mut(batch_size).enumerate() {
            let prompt = build_batch_prompt(batch);
            match self.complete(prompt).await {
                Ok(reply) => {
                    if let Err(e) = apply_batch_response(&reply, batch) {
                        warn!("Batch {} summary parse failed: {}", n + 1, e);
                    }
                }
                Err(e) => warn!("Batch {} summary request failed: {}", n + 1, e),
            }
            apply_fallback(batch);
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, ApiError> {
        let request = AnthropicRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };
        let response = self.send_request(&request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "Tokens used: {} in, {} out",
                usage.input_tokens, usage.output_tokens
            );
        }

        let text: String = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(ApiError::new(
                ErrorCode::InvalidResponse,
                "Response contained no text",
            ));
        }
        Ok(text)
    }

    async fn send_request(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, ApiError> {
        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Network error: {}", e);
                ApiError::from_reqwest(&e)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let err = parse_api_error(status, &body);

            error!(
                "API error {}: {} (code: {:?})",
                status, err.message, err.code
            );
            if err.requires_user_action {
                error!("USER ACTION REQUIRED: {}", err.user_message);
            }

            return Err(err);
        }

        response.json().await.map_err(|e| {
            ApiError::new(
                ErrorCode::ParseError,
                format!("Failed to parse response: {}", e),
            )
        })
    }
}

/// Digest prompt over at most [`MAX_DIGEST_ITEMS`] items.
pub fn build_daily_prompt(items: &[RankedItem]) -> String {
    let lines: Vec<String> = items
        .iter()
        .take(MAX_DIGEST_ITEMS)
        .enumerate()
        .map(|(i, ranked)| {
            let item = &ranked.item;
            let kol = if item.is_kol() { " [KOL]" } else { "" };
            let products = if item.tags.is_empty() {
                "Uncategorized".to_string()
            } else {
                item.tags.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            format!(
                "### {}. [{}]{} {}\n- Author: {} ({})\n- Products: {}\n- Engagement: {} likes, {} comments\n- Link: {}\n- Excerpt: {}\n",
                i + 1,
                item.source,
                kol,
                item.title,
                item.author,
                item.author_handle,
                products,
                ranked.combined_engagement,
                item.comments_count,
                item.url,
                truncate_chars(&item.content, 300)
            )
        })
        .collect();

    DAILY_SUMMARY_PROMPT.replace("{items}", &lines.join("\n"))
}

/// Batch prompt with 1-based item numbers.
pub fn build_batch_prompt(items: &[RankedItem]) -> String {
    let mut prompt = String::from(BATCH_PROMPT_HEADER);
    for (i, ranked) in items.iter().enumerate() {
        prompt.push_str(&format!(
            "## Item {}\nTitle: {}\nContent: {}\nSource: {}\n\n",
            i + 1,
            truncate_chars(&ranked.item.title, 200),
            truncate_chars(&ranked.item.content, 300),
            ranked.item.source
        ));
    }
    prompt.push_str(BATCH_PROMPT_FOOTER);
    prompt
}

lazy_static! {
    static ref FENCED_ARRAY_RE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(\[.*\])\s*```").expect("valid regex");
    static ref BARE_ARRAY_RE: Regex = Regex::new(r"(?s)(\[.*\])").expect("valid regex");
}

/// JSON array from a reply, tolerating markdown code fences and prose around it.
fn extract_json_array(reply: &str) -> &str {
    FENCED_ARRAY_RE
        .captures(reply)
        .or_else(|| BARE_ARRAY_RE.captures(reply))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
}

/// Apply a batch reply to its items. Returns how many items were filled.
pub fn apply_batch_response(reply: &str, items: &mut [RankedItem]) -> Result<usize, String> {
    let results: Vec<ItemSummary> = serde_json::from_str(extract_json_array(reply))
        .map_err(|e| format!("Invalid summary JSON: {}", e))?;

    let mut filled = 0;
    for result in results {
        let Some(slot) = result.index.checked_sub(1).and_then(|i| items.get_mut(i)) else {
            continue;
        };
        slot.item.summary = result.summary.trim().to_string();
        slot.item.sentiment = normalize_sentiment(&result.sentiment).to_string();
        filled += 1;
    }
    Ok(filled)
}

fn normalize_sentiment(sentiment: &str) -> &'static str {
    match sentiment.trim().to_lowercase().as_str() {
        "positive" => "positive",
        "negative" => "negative",
        _ => "neutral",
    }
}

/// Give items without a summary their title prefix and a neutral sentiment.
pub fn apply_fallback(items: &mut [RankedItem]) {
    for ranked in items.iter_mut() {
        if ranked.item.summary.is_empty() {
            ranked.item.summary = truncate_chars(&ranked.item.title, 50);
        }
        if ranked.item.sentiment.is_empty() {
            ranked.item.sentiment = "neutral".to_string();
        }
    }
}
