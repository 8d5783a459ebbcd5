//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sitrep_core::documents::DocumentsTable;
use sitrep_core::pipeline::{
    GenerateConfig, ProgressReporter, RunSummary, generate_assessment_results,
};
use sitrep_embeddings::HttpEmbedder;
use sitrep_rag::HttpRagClient;
use sitrep_shared::{AppConfig, DocumentColumns, dataset_token, init_config, load_config};
use sitrep_taxonomy::{DatasetClient, load_level2_problems, write_tasks_file};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitrep — taxonomy-driven humanitarian assessment answers.
#[derive(Parser)]
#[command(
    name = "sitrep",
    version,
    about = "Generate structured humanitarian-situation assessment answers from extracted documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate assessment answers for documents in a passages CSV.
    Generate {
        /// Path of the documents CSV (one row per extracted passage).
        #[arg(long)]
        documents: PathBuf,

        /// Document id to process (repeatable).
        #[arg(long = "doc-id")]
        doc_ids: Vec<String>,

        /// Process every document id found in the documents CSV.
        #[arg(long)]
        all: bool,

        /// Results CSV path (defaults to the configured output path).
        #[arg(long)]
        results: Option<PathBuf>,

        /// Taxonomy dataset name (defaults to the configured dataset).
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Fetch and reshape the taxonomy without generating answers.
    Taxonomy {
        /// Also write the reshaped problem index as JSON to this path.
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitrep=info",
        1 => "sitrep=debug",
        _ => "sitrep=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            documents,
            doc_ids,
            all,
            results,
            dataset,
        } => {
            cmd_generate(
                &documents,
                doc_ids,
                all,
                results.as_deref(),
                dataset.as_deref(),
            )
            .await
        }
        Command::Taxonomy { dump } => cmd_taxonomy(dump.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    documents_path: &Path,
    doc_ids: Vec<String>,
    all: bool,
    results: Option<&Path>,
    dataset: Option<&str>,
) -> Result<()> {
    let config = load_config()?;

    let columns = DocumentColumns::from(&config.documents);
    let documents = DocumentsTable::from_csv_path(documents_path, columns)?;

    let doc_ids = if all {
        documents.doc_ids()
    } else if doc_ids.is_empty() {
        return Err(eyre!("pass --doc-id at least once, or --all"));
    } else {
        doc_ids
    };

    if doc_ids.is_empty() {
        return Err(eyre!(
            "no document ids found in '{}'",
            documents_path.display()
        ));
    }

    let generate_config = build_generate_config(&config, doc_ids, results, dataset);

    info!(
        documents = %documents_path.display(),
        docs = generate_config.doc_ids.len(),
        dataset = %generate_config.dataset_name,
        "generating assessment results"
    );

    let embedder = HttpEmbedder::with_timeout(
        config.embeddings.endpoint.clone(),
        config.embeddings.timeout_secs,
    )?;
    let rag = HttpRagClient::with_timeout(config.rag.endpoint.clone(), config.rag.timeout_secs)?;

    let reporter = CliProgress::new();
    let summary =
        generate_assessment_results(&generate_config, &documents, &embedder, &rag, &reporter)
            .await?;

    // Print summary
    println!();
    println!("  Assessment run complete!");
    println!("  Documents: {}", summary.docs_processed);
    println!("  Skipped:   {} (already treated)", summary.docs_skipped);
    println!("  Rows:      {}", summary.rows_written);
    println!("  Failed:    {} question/document pairs", summary.triples_failed);
    println!("  Results:   {}", generate_config.results_path.display());
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn build_generate_config(
    config: &AppConfig,
    doc_ids: Vec<String>,
    results: Option<&Path>,
    dataset: Option<&str>,
) -> GenerateConfig {
    GenerateConfig {
        dataset_name: dataset
            .map(String::from)
            .unwrap_or_else(|| config.dataset.name.clone()),
        dataset_endpoint: config.dataset.endpoint.clone(),
        dataset_token: dataset_token(config),
        results_path: results
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&config.output.results_path)),
        tasks_file: PathBuf::from(&config.output.tasks_file),
        doc_ids,
        retrieval_depth: config.rag.retrieval_depth,
        passthrough_columns: config.documents.passthrough_columns.clone(),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn triple_done(&self, doc_id: &str, problem_title: &str, current: u64, total: u64) {
        self.spinner.set_message(format!(
            "Answering [{current}/{total}] {doc_id} · {problem_title}"
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// taxonomy
// ---------------------------------------------------------------------------

async fn cmd_taxonomy(dump: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let token = dataset_token(&config);

    info!(dataset = %config.dataset.name, "fetching taxonomy");

    let client = DatasetClient::new(config.dataset.endpoint.clone())?;
    let (index, tasks_to_tags) =
        load_level2_problems(&client, &config.dataset.name, token.as_deref()).await?;

    write_tasks_file(Path::new(&config.output.tasks_file), &tasks_to_tags)?;

    println!();
    println!("  Taxonomy: {}", config.dataset.name);
    for task in index.task_names() {
        let count = index.task(task).map(|entries| entries.len()).unwrap_or(0);
        println!("  {task}: {count} problem entries");
    }
    println!("  Tags file: {}", config.output.tasks_file);
    println!();

    if let Some(path) = dump {
        let json = serde_json::to_string_pretty(&index)?;
        std::fs::write(path, json)?;
        println!("  Index dumped to {}", path.display());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}
