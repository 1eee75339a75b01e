//! Offline corpus indexing.
//!
//! Reads `{input, output}` pairs, embeds each pair with the configured
//! embedder and writes the index file the server loads at startup.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use counsel_rag::core::config::{AppPaths, ConfigService};
use counsel_rag::core::logging;
use counsel_rag::rag::corpus::{build_index, load_qa_pairs, qa_passages};
use counsel_rag::rag::HttpEmbedder;

/// Builds the passage index from a Q/A corpus
#[derive(Parser, Debug)]
#[command(name = "build_index")]
#[command(about = "Embed a JSONL Q/A corpus into a passage index", long_about = None)]
struct Args {
    /// JSONL file of {"input", "output"} pairs
    input: PathBuf,

    /// Index file to write (defaults to retrieval.index_path)
    output: Option<PathBuf>,

    /// Passages per embedding request
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths.log_dir);
    let config = ConfigService::new(paths.clone())
        .load_config()
        .context("Failed to load configuration")?;

    let pairs = load_qa_pairs(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let source = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let passages = qa_passages(&pairs, &source);
    tracing::info!("Loaded {} passages from {}", passages.len(), args.input.display());

    let embedder = HttpEmbedder::new(&config.retrieval.embedder)?;
    let index = build_index(passages, &embedder, args.batch_size).await?;

    let output = args
        .output
        .unwrap_or_else(|| paths.resolve(&config.retrieval.index_path));
    index
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        "Wrote {} passages (dim {}) to {}",
        index.passages.len(),
        index.dimension,
        output.display()
    );

    Ok(())
}
