// llm-news library - collection, ranking and reporting used by the CLI
//
// The ranking engine (tagger, kol, dedup) is pure and synchronous; everything
// that touches the network lives in collectors, summarizer and pipeline.

pub mod api_error;
pub mod collectors;
pub mod config;
pub mod dedup;
pub mod kol;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod summarizer;
pub mod tagger;

// Re-export key types for convenience
pub use api_error::{ApiError, ErrorCode};
pub use config::{
    delete_api_key, ensure_config_dir, get_config_dir, has_api_key, read_api_key,
    read_kol_config, read_settings, validate_api_key, write_api_key, write_kol_config,
    write_settings, KolConfig, KolEntry, Product, Settings,
};
pub use dedup::{rank, RankedItem, Ranker};
pub use kol::KolTable;
pub use model::{KolTier, NewsItem, Source};
pub use pipeline::{prepare, run_pipeline, RunOptions, RunReport};
pub use tagger::ProductTagger;
