// Markdown daily report over the ranked item list

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dedup::RankedItem;
use crate::model::{truncate_chars, KolTier, Source};
use crate::summarizer::fallback_summary;

pub const UNCATEGORIZED: &str = "Uncategorized";

const PRODUCT_SECTION_ITEMS: usize = 10;
const KOL_SECTION_ITEMS: usize = 15;
const SOURCE_SECTION_ITEMS: usize = 8;
const PRODUCT_TITLE_CHARS: usize = 120;
const SOURCE_TITLE_CHARS: usize = 80;
const KOL_QUOTE_CHARS: usize = 300;

// ============================================================================
// Grouping
// ============================================================================

/// Items per product tag, groups in order of first appearance and items in
/// ranked order. Untagged items are collected under [`UNCATEGORIZED`], last.
pub fn group_by_product(ranked: &[RankedItem]) -> Vec<(String, Vec<&RankedItem>)> {
    let mut groups: Vec<(String, Vec<&RankedItem>)> = Vec::new();
    let mut untagged = Vec::new();

    for entry in ranked {
        if entry.item.tags.is_empty() {
            untagged.push(entry);
            continue;
        }
        for tag in &entry.item.tags {
            match groups.iter_mut().find(|(name, _)| name == tag) {
                Some((_, items)) => items.push(entry),
                None => groups.push((tag.clone(), vec![entry])),
            }
        }
    }

    if !untagged.is_empty() {
        groups.push((UNCATEGORIZED.to_string(), untagged));
    }
    groups
}

/// Items per source, groups in order of first appearance.
pub fn group_by_source(ranked: &[RankedItem]) -> Vec<(Source, Vec<&RankedItem>)> {
    let mut groups: Vec<(Source, Vec<&RankedItem>)> = Vec::new();
    for entry in ranked {
        match groups.iter_mut().find(|(source, _)| *source == entry.item.source) {
            Some((_, items)) => items.push(entry),
            None => groups.push((entry.item.source, vec![entry])),
        }
    }
    groups
}

pub fn kol_items(ranked: &[RankedItem]) -> Vec<&RankedItem> {
    ranked.iter().filter(|r| r.item.is_kol()).collect()
}

/// `(product, mentions, mean combined engagement)` per product group.
pub fn product_counts(ranked: &[RankedItem]) -> Vec<(String, usize, u64)> {
    group_by_product(ranked)
        .into_iter()
        .map(|(product, items)| {
            let total: u64 = items.iter().map(|r| r.combined_engagement).sum();
            let mean = (total as f64 / items.len() as f64).round() as u64;
            (product, items.len(), mean)
        })
        .collect()
}

pub fn source_counts(ranked: &[RankedItem]) -> Vec<(Source, usize)> {
    group_by_source(ranked)
        .into_iter()
        .map(|(source, items)| (source, items.len()))
        .collect()
}

// ============================================================================
// Rendering
// ============================================================================

fn tier_label(tier: Option<KolTier>) -> &'static str {
    match tier {
        Some(KolTier::S) => "Tier S (top influence)",
        Some(KolTier::A) => "Tier A (high influence)",
        Some(KolTier::B) => "Tier B",
        None => "",
    }
}

fn similar_suffix(entry: &RankedItem) -> String {
    match entry.duplicates() {
        0 => String::new(),
        n => format!(" (+{} similar)", n),
    }
}

fn author_line(entry: &RankedItem) -> String {
    let item = &entry.item;
    let author = if item.author.is_empty() { "unknown" } else { item.author.as_str() };
    if item.author_handle.is_empty() {
        author.to_string()
    } else {
        format!("{} ({})", author, item.author_handle)
    }
}

/// Render the full Markdown report.
pub fn render(
    ranked: &[RankedItem],
    summary: &str,
    date: NaiveDate,
    generated_at: DateTime<Utc>,
) -> String {
    let products = group_by_product(ranked);
    let sources = group_by_source(ranked);
    let kols = kol_items(ranked);

    let mut out = String::new();

    // Header + overview
    let _ = writeln!(out, "# AI Coding Tools Daily - {}\n", date.format("%Y-%m-%d"));
    let _ = writeln!(
        out,
        "> Collected from Twitter/X, Reddit, Hacker News, Weibo/Zhihu and tech news sites"
    );
    let _ = writeln!(out, "> Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M UTC"));
    out.push_str("---\n\n## Overview\n\n| Metric | Value |\n|--------|-------|\n");

    let source_names: Vec<&str> = sources.iter().map(|(s, _)| s.label()).collect();
    let product_names: Vec<&str> = products
        .iter()
        .map(|(p, _)| p.as_str())
        .filter(|p| *p != UNCATEGORIZED)
        .collect();
    let _ = writeln!(out, "| Items | {} |", ranked.len());
    let _ = writeln!(
        out,
        "| Sources | {} |",
        if source_names.is_empty() { "none".to_string() } else { source_names.join(", ") }
    );
    let _ = writeln!(out, "| KOL items | {} |", kols.len());
    let _ = writeln!(
        out,
        "| Products | {} |\n",
        if product_names.is_empty() { "none".to_string() } else { product_names.join(", ") }
    );

    // Summary
    out.push_str("---\n\n## Daily Summary\n\n");
    let summary = summary.trim();
    out.push_str(if summary.is_empty() { fallback_summary() } else { summary });
    out.push_str("\n\n");

    // Per product
    out.push_str("---\n\n## By Product\n\n");
    for (product, items) in &products {
        let _ = writeln!(out, "### {} ({} items)\n", product, items.len());
        for (i, entry) in items.iter().take(PRODUCT_SECTION_ITEMS).enumerate() {
            let item = &entry.item;
            let kol = if item.is_kol() { "**[KOL]** " } else { "" };
            let _ = writeln!(
                out,
                "{}. {}**{}**{}",
                i + 1,
                kol,
                truncate_chars(&item.title, PRODUCT_TITLE_CHARS),
                similar_suffix(entry)
            );
            let _ = writeln!(out, "   - Source: {} | Author: {}", item.source.label(), author_line(entry));
            let _ = writeln!(
                out,
                "   - Engagement: {} likes · {} comments",
                entry.combined_engagement, item.comments_count
            );
            if !item.summary.is_empty() {
                let _ = writeln!(out, "   - Summary: {}", item.summary);
            }
            if !item.url.is_empty() {
                let _ = writeln!(out, "   - [Link]({})", item.url);
            }
            out.push('\n');
        }
    }

    // KOL highlights
    out.push_str("---\n\n## KOL Highlights\n\n");
    if kols.is_empty() {
        out.push_str("_No KOL items were collected today._\n\n");
    }
    for (i, entry) in kols.iter().take(KOL_SECTION_ITEMS).enumerate() {
        let item = &entry.item;
        let quote = if item.content.is_empty() { &item.title } else { &item.content };
        let products = if item.tags.is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            item.tags.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let _ = writeln!(out, "### {}. {} - {}\n", i + 1, author_line(entry), tier_label(item.kol_tier));
        let _ = writeln!(out, "> {}\n", truncate_chars(quote, KOL_QUOTE_CHARS).replace('\n', " "));
        let _ = writeln!(
            out,
            "- Source: {} | Engagement: {} likes · {} comments",
            item.source.label(),
            entry.combined_engagement,
            item.comments_count
        );
        let _ = writeln!(out, "- Products: {}", products);
        if !item.url.is_empty() {
            let _ = writeln!(out, "- [Link]({})", item.url);
        }
        out.push('\n');
    }

    // Per source
    out.push_str("---\n\n## By Source\n\n");
    for (source, items) in &sources {
        let _ = writeln!(out, "### {} ({} items)\n", source.label(), items.len());
        for entry in items.iter().take(SOURCE_SECTION_ITEMS) {
            let item = &entry.item;
            let kol = if item.is_kol() { "[KOL] " } else { "" };
            let title = truncate_chars(&item.title, SOURCE_TITLE_CHARS);
            let linked = if item.url.is_empty() {
                title
            } else {
                format!("[{}]({})", title, item.url)
            };
            let mut line = format!(
                "- {}{} - {} · {} likes{}",
                kol,
                linked,
                if item.author.is_empty() { "unknown" } else { item.author.as_str() },
                entry.combined_engagement,
                similar_suffix(entry)
            );
            if !item.summary.is_empty() {
                let _ = write!(line, " - _{}_", item.summary);
            }
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');
    }

    // Statistics
    out.push_str("---\n\n## Statistics\n\n### Product mentions\n\n");
    out.push_str("| Product | Mentions | Mean engagement |\n|---------|----------|-----------------|\n");
    for (product, count, mean) in product_counts(ranked) {
        let _ = writeln!(out, "| {} | {} | {} |", product, count, mean);
    }
    out.push_str("\n### Source distribution\n\n| Source | Items |\n|--------|-------|\n");
    for (source, count) in source_counts(ranked) {
        let _ = writeln!(out, "| {} | {} |", source.label(), count);
    }

    let _ = writeln!(out, "\n---\n\n<sub>Generated by llm-news | Data through {}</sub>", date.format("%Y-%m-%d"));
    out
}

/// Write the report to `<report_dir>/<date>.md`, creating the directory.
pub fn save(report_dir: &Path, date: NaiveDate, content: &str) -> Result<PathBuf, String> {
    fs::create_dir_all(report_dir)
        .map_err(|e| format!("Failed to create report directory {}: {}", report_dir.display(), e))?;

    let path = report_dir.join(format!("{}.md", date.format("%Y-%m-%d")));
    fs::write(&path, content).map_err(|e| format!("Failed to write report: {}", e))?;

    info!("Report saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsItem;
    use chrono::TimeZone;

    fn entry(title: &str, source: Source, tags: &[&str], engagement: u64) -> RankedItem {
        let mut item = NewsItem::new(
            title,
            source,
            format!("https://example.com/{}", title.len()),
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
        )
        .with_author("Someone")
        .with_engagement(engagement);
        item.tags = tags.iter().map(|t| t.to_string()).collect();
        RankedItem {
            item,
            cluster_size: 1,
            combined_engagement: engagement,
            score: engagement as f64,
        }
    }

    fn sample() -> Vec<RankedItem> {
        let mut kol = entry("Karpathy on agents", Source::Twitter, &["Claude", "Cursor"], 900);
        kol.item.kol_tier = Some(KolTier::S);
        kol.item.author_handle = "@karpathy".to_string();
        kol.item.content = "Agents are getting good.".to_string();

        let mut cluster = entry("Copilot adds code review", Source::Hackernews, &["GitHub Copilot"], 600);
        cluster.cluster_size = 3;

        vec![
            kol,
            cluster,
            entry("Claude Code pricing", Source::Reddit, &["Claude"], 300),
            entry("Random AI chatter", Source::Hackernews, &[], 100),
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn test_group_by_product_keeps_ranked_order() {
        let ranked = sample();
        let groups = group_by_product(&ranked);
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Claude", "Cursor", "GitHub Copilot", UNCATEGORIZED]);

        let claude: Vec<&str> = groups[0].1.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(claude, vec!["Karpathy on agents", "Claude Code pricing"]);
    }

    #[test]
    fn test_counts() {
        let ranked = sample();
        assert_eq!(
            source_counts(&ranked),
            vec![(Source::Twitter, 1), (Source::Hackernews, 2), (Source::Reddit, 1)]
        );
        let claude = product_counts(&ranked)
            .into_iter()
            .find(|(p, _, _)| p == "Claude")
            .unwrap();
        assert_eq!(claude, ("Claude".to_string(), 2, 600));
        assert_eq!(kol_items(&ranked).len(), 1);
    }

    #[test]
    fn test_render_sections() {
        let ranked = sample();
        let generated = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        let report = render(&ranked, "Big day for agents.", date(), generated);

        assert!(report.starts_with("# AI Coding Tools Daily - 2025-06-02"));
        assert!(report.contains("> Generated: 2025-06-02 09:30 UTC"));
        assert!(report.contains("| Items | 4 |"));
        assert!(report.contains("| KOL items | 1 |"));
        assert!(report.contains("Big day for agents."));
        assert!(report.contains("**Copilot adds code review** (+2 similar)"));
        assert!(report.contains("### 1. Someone (@karpathy) - Tier S (top influence)"));
        assert!(report.contains("> Agents are getting good."));
        assert!(report.contains("### Uncategorized (1 items)"));
        assert!(report.contains("| Claude | 2 | 600 |"));
        assert!(report.contains("| Hacker News | 2 |"));
    }

    #[test]
    fn test_empty_url_renders_without_link() {
        let mut kol = entry("Karpathy on Claude", Source::Twitter, &["Claude"], 40);
        kol.item.url = String::new();
        kol.item.kol_tier = Some(KolTier::A);
        let report = render(&[kol], "x", date(), Utc::now());

        assert!(!report.contains("]()"));
        assert!(!report.contains("[Link]"));
        assert!(report.contains("- [KOL] Karpathy on Claude - Someone · 40 likes"));
    }

    #[test]
    fn test_render_empty_uses_fallback() {
        let report = render(&[], "", date(), Utc::now());
        assert!(report.contains(fallback_summary()));
        assert!(report.contains("_No KOL items were collected today._"));
        assert!(report.contains("| Items | 0 |"));
    }

    #[test]
    fn test_titles_truncated_on_char_boundary() {
        let long = "克劳德".repeat(60);
        let ranked = vec![entry(&long, Source::Weibo, &["Claude"], 10)];
        let report = render(&ranked, "x", date(), Utc::now());
        let expected = format!("**{}...**", "克劳德".repeat(40));
        assert!(report.contains(&expected));
    }

    #[test]
    fn test_save_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");
        let path = save(&target, date(), "# hi").unwrap();
        assert_eq!(path, target.join("2025-06-02.md"));
        assert_eq!(fs::read_to_string(path).unwrap(), "# hi");
    }
}
