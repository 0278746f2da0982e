//! One collection run: collect, prepare, rank, summarize, render, save.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::collectors::{collector_for, safe_collect, CollectContext, Collector, COLLECTOR_NAMES};
use crate::config::{read_api_key, read_kol_config, read_settings};
use crate::dedup::{RankedItem, Ranker};
use crate::kol::KolTable;
use crate::model::NewsItem;
use crate::report;
use crate::summarizer::{fallback_summary, Summarizer};
use crate::tagger::ProductTagger;

/// Options for a single run. `None` fields fall back to settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Collector names; empty means all of them.
    pub sources: Vec<String>,
    pub lookback_days: Option<u32>,
    /// Skip LLM calls; the report is still written.
    pub dry_run: bool,
    pub max_items: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub sources: Vec<String>,
    pub collected: usize,
    pub rejected: usize,
    pub ranked: usize,
    pub kol_items: usize,
    pub summarized: bool,
    pub report_path: PathBuf,
}

/// Validate, tag and weight raw items. Invalid items are logged and dropped.
pub fn prepare(items: Vec<NewsItem>, tagger: &ProductTagger, kol: &KolTable) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter_map(|mut item| {
            tagger.apply(&mut item);
            kol.apply(&mut item);
            match item.validate() {
                Ok(()) => Some(item),
                Err(e) => {
                    warn!("Dropping item: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Build collectors for the requested names in order, skipping unknown and
/// repeated ones. Fails when nothing usable is left.
pub fn resolve_collectors(names: &[String]) -> Result<Vec<Box<dyn Collector>>, String> {
    let requested: Vec<String> = if names.is_empty() {
        COLLECTOR_NAMES.iter().map(|n| n.to_string()).collect()
    } else {
        names.to_vec()
    };

    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    for name in &requested {
        match collector_for(name) {
            Some(collector) => {
                if collectors.iter().any(|c| c.source_name() == collector.source_name()) {
                    continue;
                }
                collectors.push(collector);
            }
            None => warn!(
                "Unknown source '{}' (available: {})",
                name,
                COLLECTOR_NAMES.join(", ")
            ),
        }
    }

    if collectors.is_empty() {
        return Err(format!(
            "No valid sources in '{}'. Available: {}",
            requested.join(","),
            COLLECTOR_NAMES.join(", ")
        ));
    }
    Ok(collectors)
}

async fn summarize(ranked: &mut [RankedItem], dry_run: bool, summarizer: Option<Summarizer>) -> (String, bool) {
    if dry_run {
        info!("Dry run: skipping LLM summaries");
        return (fallback_summary().to_string(), false);
    }
    let Some(summarizer) = summarizer else {
        warn!("ANTHROPIC_API_KEY not configured, skipping LLM summaries");
        return (fallback_summary().to_string(), false);
    };

    summarizer.summarize_items(ranked).await;
    match summarizer.daily_summary(ranked).await {
        Ok(summary) => (summary, true),
        Err(e) => {
            warn!("Daily summary failed: {}", e);
            if e.requires_user_action {
                warn!("USER ACTION REQUIRED: {}", e.user_message);
            }
            (fallback_summary().to_string(), false)
        }
    }
}

pub async fn run_pipeline(options: RunOptions) -> Result<RunReport, String> {
    let settings = read_settings()?;
    let kol_config = read_kol_config()?;
    let collectors = resolve_collectors(&options.sources)?;

    let date = options.date.unwrap_or_else(|| Utc::now().date_naive());
    let lookback_days = options.lookback_days.unwrap_or(settings.collection.lookback_days);
    let max_items = options.max_items.unwrap_or(settings.collection.max_items_per_report);
    let threshold = options
        .similarity_threshold
        .unwrap_or(settings.collection.similarity_threshold);
    let source_names: Vec<String> = collectors.iter().map(|c| c.source_name().to_string()).collect();

    info!(
        "Run for {} | sources: {} | lookback: {}d | max items: {}",
        date,
        source_names.join(", "),
        lookback_days,
        max_items
    );

    let kol = KolTable::from_config(&kol_config);
    let ctx = CollectContext::new(settings.clone(), kol_config, lookback_days)
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    // Results come back in collector order regardless of completion order.
    let batches = join_all(collectors.iter().map(|c| safe_collect(c.as_ref(), &ctx))).await;
    let raw: Vec<NewsItem> = batches.into_iter().flatten().collect();
    let collected = raw.len();

    let items = prepare(raw, &ctx.tagger, &kol);
    let rejected = collected - items.len();

    let mut ranked = Ranker::new(threshold).rank(items, Some(max_items));

    let summarizer = match read_api_key() {
        Some(key) if !options.dry_run => Some(
            Summarizer::new(key, settings.summarizer.clone())
                .map_err(|e| format!("Failed to build summarizer: {}", e))?,
        ),
        _ => None,
    };
    let (summary, summarized) = summarize(&mut ranked, options.dry_run, summarizer).await;

    let content = report::render(&ranked, &summary, date, Utc::now());
    let report_path = report::save(&PathBuf::from(&settings.output.report_dir), date, &content)?;

    let kol_items = report::kol_items(&ranked).len();
    Ok(RunReport {
        date,
        sources: source_names,
        collected,
        rejected,
        ranked: ranked.len(),
        kol_items,
        summarized,
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KolConfig, KolEntry, Product};
    use crate::model::{KolTier, Source};
    use chrono::TimeZone;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_prepare_tags_weights_and_drops() {
        let tagger = ProductTagger::new(&[Product::new("Claude", &["claude"])]);
        let kol = KolTable::from_config(&KolConfig {
            twitter: vec![KolEntry {
                handle: "@karpathy".to_string(),
                name: "Andrej Karpathy".to_string(),
                tier: KolTier::S,
            }],
            ..Default::default()
        });

        let items = vec![
            NewsItem::new("Claude Code is great", Source::Twitter, "https://t/1", ts())
                .with_handle("@Karpathy")
                .with_engagement(100),
            NewsItem::new("   ", Source::Reddit, "https://r/2", ts()),
            NewsItem::new("Unrelated", Source::Hackernews, "https://h/3", ts()),
        ];

        let prepared = prepare(items, &tagger, &kol);
        assert_eq!(prepared.len(), 2);
        assert!(prepared[0].tags.contains("Claude"));
        assert_eq!(prepared[0].kol_tier, Some(KolTier::S));
        assert_eq!(prepared[0].weight, 3.0);
        assert!(prepared[1].tags.is_empty());
        assert_eq!(prepared[1].weight, 1.0);
    }

    #[test]
    fn test_resolve_collectors() {
        let all = resolve_collectors(&[]).unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.source_name()).collect();
        assert_eq!(names, COLLECTOR_NAMES.to_vec());

        let picked = resolve_collectors(&[
            "reddit".to_string(),
            "bogus".to_string(),
            "hn".to_string(),
            "hackernews".to_string(),
        ])
        .unwrap();
        let names: Vec<&str> = picked.iter().map(|c| c.source_name()).collect();
        assert_eq!(names, vec!["reddit", "hackernews"]);

        assert!(resolve_collectors(&["bogus".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_uses_fallback_summary() {
        let mut ranked = Vec::new();
        let (summary, summarized) = summarize(&mut ranked, true, None).await;
        assert_eq!(summary, fallback_summary());
        assert!(!summarized);
    }
}
