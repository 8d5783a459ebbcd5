//! Shared types, error model, and configuration for sitrep.
//!
//! This crate is the foundation depended on by all other sitrep crates.
//! It provides:
//! - [`SitrepError`] — the unified error type
//! - Domain types ([`ProblemEntry`], [`TaxonomyIndex`], [`PassageRow`],
//!   [`AssessmentRow`], [`DocumentColumns`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatasetConfig, DocumentsConfig, EmbeddingsConfig, OutputConfig, RagConfig,
    config_dir, config_file_path, dataset_token, init_config, load_config, load_config_from,
};
pub use error::{Result, SitrepError};
pub use types::{
    AssessmentRow, DocumentColumns, PLACEHOLDER, PassageRow, ProblemEntry, RESULT_COLUMNS,
    TAG_SEPARATOR, TasksToTags, TaxonomyIndex,
};
