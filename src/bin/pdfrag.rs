//! CLI binary for pdfrag.
//!
//! A thin shim over the library crate that maps CLI flags to [`KbConfig`]
//! and prints results. The in-memory registry makes this a single-process
//! tool: ids are stable only within one run, which is enough for trying the
//! pipeline out; production deployments inject their own registry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfrag::{InMemoryRegistry, KbConfig, KnowledgeService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pdfrag",
    version,
    about = "Ingest PDFs into a searchable vector index and query it"
)]
struct Cli {
    /// Directory for uploaded files and extracted images.
    #[arg(long, global = true, default_value = "data/files")]
    storage_dir: PathBuf,

    /// Path of the vector collection snapshot.
    #[arg(long, global = true, default_value = "data/kb.json")]
    snapshot: PathBuf,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, global = true, env = "PDFRAG_API_BASE", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// Embedding model id.
    #[arg(long, global = true, default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Multimodal model id used for image description.
    #[arg(long, global = true, default_value = "gpt-4o-mini")]
    vision_model: String,

    /// Native engine workers (page tasks beyond this queue).
    #[arg(long, global = true, default_value_t = 1)]
    engine_workers: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF file.
    Upload {
        /// Path of the PDF to ingest.
        file: PathBuf,
    },
    /// Run a similarity query.
    Query {
        /// Query text.
        text: String,
        /// Maximum number of results.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Minimum similarity score, 0.0–1.0.
        #[arg(long, default_value_t = 0.0)]
        threshold: f32,
    },
    /// List registered files.
    List {
        /// Comma-separated id filter.
        #[arg(long)]
        ids: Option<String>,
        /// Re-extract and print each file's full text.
        #[arg(long)]
        content: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = KbConfig::builder()
        .storage_dir(cli.storage_dir.clone())
        .snapshot_path(cli.snapshot.clone())
        .api_base_url(cli.api_base.clone())
        .embedding_model(cli.embedding_model.clone())
        .vision_model(cli.vision_model.clone())
        .engine_workers(cli.engine_workers)
        .engine_acquire_timeout(Duration::from_secs(30))
        .build()
        .context("invalid configuration")?;

    let registry = Arc::new(InMemoryRegistry::new());
    let service = KnowledgeService::from_config(config, registry)
        .await
        .context("failed to initialise service")?;

    match cli.command {
        Command::Upload { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let receipt = service.upload(&filename, &bytes).await?;
            println!(
                "id {}  {} pages  {} chunks",
                receipt.id, receipt.pages, receipt.chunks
            );
        }
        Command::Query {
            text,
            limit,
            threshold,
        } => {
            let results = service.query(&text, limit, threshold).await?;
            if results.is_empty() {
                println!("no results");
            }
            for hit in results {
                println!("{:.3}  {}", hit.similarity, hit.content.replace('\n', " "));
            }
        }
        Command::List { ids, content } => {
            let records = service.list(ids.as_deref(), content).await?;
            for record in records {
                println!("{}  {}", record.id, record.path.display());
                if let Some(text) = record.content {
                    println!("{text}");
                }
            }
        }
    }

    Ok(())
}
