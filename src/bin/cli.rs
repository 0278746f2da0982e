// llm-news CLI - daily digest of AI coding tool news
//
// Usage: llm-news <command> [options]

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use llm_news::collectors::COLLECTOR_NAMES;
use llm_news::config::{
    get_kol_list_path, get_settings_path, read_env_value, TWITTER_TOKEN_VAR, WEIBO_COOKIE_VAR,
    ZHIHU_COOKIE_VAR,
};
use llm_news::{
    delete_api_key, ensure_config_dir, get_config_dir, has_api_key, prepare, read_kol_config,
    read_settings, report, run_pipeline, validate_api_key, write_api_key, write_kol_config,
    write_settings, KolConfig, KolTable, NewsItem, ProductTagger, RankedItem, Ranker, RunOptions,
    Settings, Source,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Helper to safely serialize JSON for output. Returns error JSON if serialization fails.
fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"JSON serialization failed: {}\"}}", e))
}

#[derive(Parser)]
#[command(
    name = "llm-news",
    version = VERSION,
    about = "Collect, deduplicate and rank AI coding tool news into a daily report",
    long_about = None
)]
struct Cli {
    /// Output as JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect from sources and write today's report
    Run {
        /// Comma-separated collector names (default: all)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,
        /// Lookback window in days
        #[arg(short, long)]
        days: Option<u32>,
        /// Skip LLM summaries
        #[arg(long)]
        dry_run: bool,
        /// Maximum items in the report
        #[arg(short, long)]
        max_items: Option<usize>,
        /// Title similarity threshold (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Rank a JSON array of items offline
    Rank {
        /// Path to a JSON file with an array of items
        file: String,
        /// Maximum items to keep
        #[arg(short, long)]
        max_items: Option<usize>,
        /// Title similarity threshold (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Print a Markdown report instead of a table
        #[arg(long)]
        markdown: bool,
    },

    /// List available collectors
    Sources,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect the KOL list
    Kol {
        #[command(subcommand)]
        action: KolAction,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write default settings and an empty KOL list
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
    /// Set a configuration value (e.g. collection.lookback_days 2)
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// Manage API key
    #[command(name = "api-key")]
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Subcommand)]
enum ApiKeyAction {
    /// Check if API key is set
    Show,
    /// Set the API key
    Set {
        /// Your Anthropic API key
        key: String,
    },
    /// Clear the API key
    Clear,
}

// ============================================================================
// KOL Commands
// ============================================================================

#[derive(Subcommand)]
enum KolAction {
    /// List configured KOLs
    List {
        /// Only show one source
        #[arg(short, long)]
        source: Option<String>,
    },
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let result = match cli.command {
        Commands::Run {
            sources,
            days,
            dry_run,
            max_items,
            threshold,
        } => {
            let options = RunOptions {
                sources,
                lookback_days: days,
                dry_run,
                max_items,
                similarity_threshold: threshold,
                date: None,
            };
            handle_run(options, cli.json).await
        }
        Commands::Rank {
            file,
            max_items,
            threshold,
            markdown,
        } => handle_rank(&file, max_items, threshold, markdown, cli.json),
        Commands::Sources => handle_sources(cli.json),
        Commands::Config { action } => handle_config(action, cli.json),
        Commands::Kol { action } => handle_kol(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

// ============================================================================
// Run / Rank Handlers
// ============================================================================

async fn handle_run(options: RunOptions, json: bool) -> Result<(), String> {
    if let Some(t) = options.similarity_threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("--threshold must be between 0.0 and 1.0, got {}", t));
        }
    }

    let summary = run_pipeline(options).await?;

    if json {
        println!("{}", to_json(&summary));
        return Ok(());
    }

    println!("{} Report for {}", "✓".green(), summary.date.to_string().bold());
    println!();
    println!("  Sources:   {}", summary.sources.join(", "));
    println!("  Collected: {}", summary.collected);
    if summary.rejected > 0 {
        println!("  Rejected:  {}", summary.rejected.to_string().yellow());
    }
    println!("  Ranked:    {}", summary.ranked);
    println!("  KOL items: {}", summary.kol_items);
    println!(
        "  Summary:   {}",
        if summary.summarized {
            "✓ generated".green().to_string()
        } else {
            "○ fallback".dimmed().to_string()
        }
    );
    println!();
    println!("  Saved to {}", summary.report_path.display().to_string().cyan());
    Ok(())
}

fn handle_rank(
    file: &str,
    max_items: Option<usize>,
    threshold: Option<f64>,
    markdown: bool,
    json: bool,
) -> Result<(), String> {
    let content =
        std::fs::read_to_string(file).map_err(|e| format!("Failed to read {}: {}", file, e))?;
    let items: Vec<NewsItem> =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", file, e))?;

    let settings = read_settings()?;
    let kol_config = read_kol_config()?;
    let tagger = ProductTagger::new(&settings.products);
    let kol = KolTable::from_config(&kol_config);

    let total = items.len();
    let items = prepare(items, &tagger, &kol);
    let threshold = threshold.unwrap_or(settings.collection.similarity_threshold);
    let ranked = Ranker::new(threshold).rank(items, max_items);

    if json {
        println!("{}", to_json(&ranked));
    } else if markdown {
        let now = Utc::now();
        println!("{}", report::render(&ranked, "", now.date_naive(), now));
    } else if ranked.is_empty() {
        println!("{}", "No items to rank.".yellow());
    } else {
        print_ranked_table(&ranked);
        println!(
            "\n{} items in, {} clusters out (threshold {:.2})",
            total,
            ranked.len(),
            threshold
        );
    }
    Ok(())
}

fn print_ranked_table(ranked: &[RankedItem]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Score", "Engagement", "Similar", "Source", "Title", "Products"]);

    for (i, entry) in ranked.iter().enumerate() {
        let title = if entry.item.is_kol() {
            format!("★ {}", entry.item.title)
        } else {
            entry.item.title.clone()
        };
        let similar = match entry.duplicates() {
            0 => String::new(),
            n => format!("+{}", n),
        };
        table.add_row(vec![
            (i + 1).to_string(),
            format!("{:.1}", entry.score),
            entry.combined_engagement.to_string(),
            similar,
            entry.item.source.label().to_string(),
            title,
            entry.item.tags.iter().cloned().collect::<Vec<_>>().join(", "),
        ]);
    }

    println!("{table}");
}

// ============================================================================
// Sources Handler
// ============================================================================

fn credential_status(name: &str) -> (&'static str, bool) {
    match name {
        "twitter" => (TWITTER_TOKEN_VAR, read_env_value(TWITTER_TOKEN_VAR).is_some()),
        "weibo_zhihu" => (
            "WEIBO_COOKIE / ZHIHU_COOKIE",
            read_env_value(WEIBO_COOKIE_VAR).is_some() || read_env_value(ZHIHU_COOKIE_VAR).is_some(),
        ),
        _ => ("", true),
    }
}

fn handle_sources(json: bool) -> Result<(), String> {
    if json {
        let sources: Vec<_> = COLLECTOR_NAMES
            .iter()
            .map(|name| {
                let (credential, ready) = credential_status(name);
                serde_json::json!({ "name": name, "credential": credential, "ready": ready })
            })
            .collect();
        println!("{}", to_json(&serde_json::json!({ "sources": sources })));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Source", "Credential", "Status"]);

    for name in COLLECTOR_NAMES {
        let (credential, ready) = credential_status(name);
        let status = if ready {
            "✓ ready".green().to_string()
        } else {
            "○ not configured".dimmed().to_string()
        };
        table.add_row(vec![
            name.to_string(),
            if credential.is_empty() { "-".to_string() } else { credential.to_string() },
            status,
        ]);
    }

    println!("{table}");
    Ok(())
}

// ============================================================================
// Config Handlers
// ============================================================================

fn handle_config(action: ConfigAction, json: bool) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            let settings = read_settings()?;
            let kol = read_kol_config()?;
            let has_key = has_api_key();
            let config_dir = get_config_dir();

            if json {
                println!(
                    "{}",
                    to_json(&serde_json::json!({
                        "config_dir": config_dir.display().to_string(),
                        "api_key_set": has_key,
                        "kol_count": kol.total(),
                        "settings": settings,
                    }))
                );
            } else {
                println!("{}", "Configuration".bold());
                println!();
                println!(
                    "  Config directory: {}",
                    config_dir.display().to_string().dimmed()
                );
                println!(
                    "  API key: {}",
                    if has_key {
                        "✓ set".green().to_string()
                    } else {
                        "✗ not set".red().to_string()
                    }
                );
                println!("  KOLs: {}", kol.total());
                println!();
                println!("{}", "Collection".bold());
                println!();
                println!("  Lookback days: {}", settings.collection.lookback_days);
                println!(
                    "  Max items per source: {}",
                    settings.collection.max_items_per_source
                );
                println!(
                    "  Max items per report: {}",
                    settings.collection.max_items_per_report
                );
                println!(
                    "  Similarity threshold: {}",
                    settings.collection.similarity_threshold
                );
                println!();
                println!("{}", "Summarizer".bold());
                println!();
                println!("  Model: {}", settings.summarizer.model.cyan());
                println!("  Batch size: {}", settings.summarizer.batch_size);
                println!("  Report directory: {}", settings.output.report_dir);
                println!();
                println!("{}", "Products".bold());
                println!();
                for product in &settings.products {
                    println!(
                        "  {}: {}",
                        product.name,
                        product.keywords.join(", ").dimmed()
                    );
                }
            }
        }

        ConfigAction::Init { force } => {
            ensure_config_dir()?;
            let settings_path = get_settings_path();
            let kol_path = get_kol_list_path();

            let mut written = Vec::new();
            if force || !settings_path.exists() {
                write_settings(&Settings::default())?;
                written.push(settings_path.display().to_string());
            }
            if force || !kol_path.exists() {
                write_kol_config(&KolConfig::default())?;
                written.push(kol_path.display().to_string());
            }

            if json {
                println!("{}", to_json(&serde_json::json!({ "written": written })));
            } else if written.is_empty() {
                println!("Configuration already exists (use --force to overwrite)");
            } else {
                for path in &written {
                    println!("{} Wrote {}", "✓".green(), path);
                }
            }
        }

        ConfigAction::Set { key, value } => {
            let mut settings = read_settings()?;
            settings.set_value(&key, &value)?;
            ensure_config_dir()?;
            write_settings(&settings)?;

            if json {
                println!("{}", serde_json::json!({ "updated": key, "value": value }));
            } else {
                println!("{} Set {} = {}", "✓".green(), key, value);
            }
        }

        ConfigAction::ApiKey { action } => match action {
            ApiKeyAction::Show => {
                if has_api_key() {
                    if json {
                        println!("{}", serde_json::json!({ "api_key_set": true }));
                    } else {
                        println!("{} API key is configured", "✓".green());
                    }
                } else if json {
                    println!("{}", serde_json::json!({ "api_key_set": false }));
                } else {
                    println!("{} No API key configured", "✗".red());
                    println!("\nSet with: llm-news config api-key set <YOUR_KEY>");
                }
            }

            ApiKeyAction::Set { key } => {
                validate_api_key(&key)?;
                write_api_key(&key)?;

                if json {
                    println!("{}", serde_json::json!({ "status": "success" }));
                } else {
                    println!("{} API key saved", "✓".green());
                }
            }

            ApiKeyAction::Clear => {
                delete_api_key()?;

                if json {
                    println!("{}", serde_json::json!({ "status": "cleared" }));
                } else {
                    println!("{} API key cleared", "✓".green());
                }
            }
        },
    }

    Ok(())
}

// ============================================================================
// KOL Handlers
// ============================================================================

fn handle_kol(action: KolAction, json: bool) -> Result<(), String> {
    match action {
        KolAction::List { source } => {
            let config = read_kol_config()?;
            let sources: Vec<Source> = match source {
                Some(name) => vec![Source::parse(&name).ok_or_else(|| {
                    format!("Unknown source: {} (try twitter, reddit, hackernews, weibo, zhihu, tech_news)", name)
                })?],
                None => Source::ALL.to_vec(),
            };

            let entries: Vec<_> = sources
                .iter()
                .flat_map(|s| config.entries(*s).iter().map(move |e| (*s, e)))
                .collect();

            if json {
                let list: Vec<_> = entries
                    .iter()
                    .map(|(s, e)| {
                        serde_json::json!({
                            "source": s.as_str(),
                            "handle": e.handle,
                            "name": e.name,
                            "tier": e.tier.as_str(),
                        })
                    })
                    .collect();
                println!("{}", to_json(&serde_json::json!({ "kols": list })));
            } else if entries.is_empty() {
                println!("{}", "No KOLs configured.".yellow());
                println!("Edit {} to add some.", get_kol_list_path().display());
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Source", "Handle", "Name", "Tier"]);
                for (source, entry) in &entries {
                    table.add_row(vec![
                        source.label().to_string(),
                        entry.handle.clone(),
                        entry.name.clone(),
                        format!("{} (×{})", entry.tier.as_str(), entry.tier.multiplier()),
                    ]);
                }
                println!("{table}");
            }
        }
    }

    Ok(())
}
