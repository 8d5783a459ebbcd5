//! sitrep CLI — humanitarian situation assessment generation.
//!
//! Matches a taxonomy of analytical questions against extracted document
//! passages, synthesizes answers through external embeddings and RAG
//! collaborators, and persists incremental results to CSV.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
