//! Application configuration for sitrep.
//!
//! User config lives at `~/.sitrep/sitrep.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SitrepError};
use crate::types::DocumentColumns;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitrep.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitrep";

// ---------------------------------------------------------------------------
// Config structs (matching sitrep.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Taxonomy dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Embeddings collaborator settings.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// RAG collaborator settings.
    #[serde(default)]
    pub rag: RagConfig,

    /// Output file locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Documents table column overrides.
    #[serde(default)]
    pub documents: DocumentsConfig,
}

/// `[dataset]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Taxonomy dataset name on the dataset server.
    #[serde(default = "default_dataset_name")]
    pub name: String,

    /// Base URL of the dataset rows API.
    #[serde(default = "default_dataset_endpoint")]
    pub endpoint: Url,

    /// Name of the env var holding the access token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: default_dataset_name(),
            endpoint: default_dataset_endpoint(),
            token_env: default_token_env(),
        }
    }
}

fn default_dataset_name() -> String {
    "Sfekih/humanitarian_problems_questions".into()
}
fn default_dataset_endpoint() -> Url {
    Url::parse("https://datasets-server.huggingface.co").expect("valid default endpoint")
}
fn default_token_env() -> String {
    "HF_TOKEN".into()
}

/// `[embeddings]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Embeddings service endpoint (batch POST).
    #[serde(default = "default_embeddings_endpoint")]
    pub endpoint: Url,

    /// Request timeout in seconds. One batch call embeds every question.
    #[serde(default = "default_embeddings_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embeddings_endpoint(),
            timeout_secs: default_embeddings_timeout(),
        }
    }
}

fn default_embeddings_endpoint() -> Url {
    Url::parse("http://127.0.0.1:8080/embed").expect("valid default endpoint")
}
fn default_embeddings_timeout() -> u64 {
    120
}

/// `[rag]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// RAG service endpoint.
    #[serde(default = "default_rag_endpoint")]
    pub endpoint: Url,

    /// Request timeout in seconds.
    #[serde(default = "default_rag_timeout")]
    pub timeout_secs: u64,

    /// Number of retrieved passages kept per question.
    #[serde(default = "default_retrieval_depth")]
    pub retrieval_depth: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rag_endpoint(),
            timeout_secs: default_rag_timeout(),
            retrieval_depth: default_retrieval_depth(),
        }
    }
}

fn default_rag_endpoint() -> Url {
    Url::parse("http://127.0.0.1:8090/answers").expect("valid default endpoint")
}
fn default_rag_timeout() -> u64 {
    300
}
fn default_retrieval_depth() -> usize {
    15
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the persisted results CSV.
    #[serde(default = "default_results_path")]
    pub results_path: String,

    /// Path of the task → tag-list JSON side file, overwritten each run.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
            tasks_file: default_tasks_file(),
        }
    }
}

fn default_results_path() -> String {
    "data/assessment_results.csv".into()
}
fn default_tasks_file() -> String {
    "data/tasks_to_problems_list.json".into()
}

/// `[documents]` section — column names of the input documents table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_doc_id_col")]
    pub doc_id_col: String,

    #[serde(default = "default_primary_country_col")]
    pub primary_country_col: String,

    #[serde(default = "default_document_title_col")]
    pub document_title_col: String,

    #[serde(default = "default_level2_problems_col")]
    pub level2_problems_col: String,

    #[serde(default = "default_text_col")]
    pub text_col: String,

    /// Columns forwarded verbatim to the RAG collaborator.
    #[serde(default = "default_passthrough_columns")]
    pub passthrough_columns: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            doc_id_col: default_doc_id_col(),
            primary_country_col: default_primary_country_col(),
            document_title_col: default_document_title_col(),
            level2_problems_col: default_level2_problems_col(),
            text_col: default_text_col(),
            passthrough_columns: default_passthrough_columns(),
        }
    }
}

fn default_doc_id_col() -> String {
    "doc_id".into()
}
fn default_primary_country_col() -> String {
    "Primary Country".into()
}
fn default_document_title_col() -> String {
    "Document Title".into()
}
fn default_level2_problems_col() -> String {
    "Level 2 Problems".into()
}
fn default_text_col() -> String {
    "Extraction Text".into()
}
fn default_passthrough_columns() -> Vec<String> {
    [
        "Extraction Text",
        "Document Title",
        "Document Publishing Date",
        "File Name",
        "Document Source",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl From<&DocumentsConfig> for DocumentColumns {
    fn from(config: &DocumentsConfig) -> Self {
        Self {
            doc_id: config.doc_id_col.clone(),
            primary_country: config.primary_country_col.clone(),
            document_title: config.document_title_col.clone(),
            level2_problems: config.level2_problems_col.clone(),
            text: config.text_col.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitrep/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitrepError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitrep/sitrep.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitrepError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitrepError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitrepError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SitrepError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitrepError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the dataset access token from the configured env var, if set.
/// Public taxonomy datasets need no token, so absence is not an error.
pub fn dataset_token(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.dataset.token_env) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("results_path"));
        assert!(toml_str.contains("HF_TOKEN"));
        assert!(toml_str.contains("humanitarian_problems_questions"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.rag.retrieval_depth, 15);
        assert_eq!(parsed.dataset.token_env, "HF_TOKEN");
        assert_eq!(parsed.output.tasks_file, "data/tasks_to_problems_list.json");
    }

    #[test]
    fn config_with_overrides() {
        let toml_str = r#"
[dataset]
name = "acme/problems"

[documents]
doc_id_col = "lead_id"
passthrough_columns = ["Extraction Text"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.dataset.name, "acme/problems");
        assert_eq!(config.documents.doc_id_col, "lead_id");
        assert_eq!(config.documents.passthrough_columns, vec!["Extraction Text"]);
        // Untouched sections fall back to defaults
        assert_eq!(config.rag.retrieval_depth, 15);
    }

    #[test]
    fn document_columns_from_config() {
        let docs = DocumentsConfig::default();
        let cols = DocumentColumns::from(&docs);
        assert_eq!(cols.primary_country, "Primary Country");
        assert_eq!(cols.text, "Extraction Text");
    }

    #[test]
    fn missing_token_env_is_none() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.dataset.token_env = "SITREP_TEST_NONEXISTENT_TOKEN_9321".into();
        assert!(dataset_token(&config).is_none());
    }
}
