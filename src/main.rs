//! # medrag CLI
//!
//! ## Usage
//!
//! ```bash
//! medrag --config ./medrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medrag serve` | Start the HTTP API |
//! | `medrag ingest` | Ingest every PDF in the documents directory |
//! | `medrag ask "<question>"` | Answer one question from the manuals |
//! | `medrag split <file.pdf>` | Show how a PDF would be chunked |
//! | `medrag stats` | Show vector index statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Preview chunk counts without calling any API
//! medrag ingest --dry-run
//!
//! # Ask a question, citing at most three passages
//! medrag ask "How do I prime the Centurion fluidics?" --max-results 3
//!
//! # Serve the HTTP API on [server].bind
//! medrag serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use medrag::commands;
use medrag::config;
use medrag::logging::init_logging;
use medrag::server;

/// medrag: question answering over medical-device manuals.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without it, `./medrag.toml` is used when present, built-in
/// defaults otherwise.
#[derive(Parser)]
#[command(
    name = "medrag",
    about = "Retrieval-augmented question answering over medical-device manuals",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// If the vector index already holds vectors from an earlier run, the
    /// service starts ready; otherwise call `POST /initialize` first.
    Serve,

    /// Ingest every PDF in `[documents].path`.
    ///
    /// Requires a persistent index (`[index].provider = "pinecone"`)
    /// unless `--dry-run` is given.
    Ingest {
        /// Extract and split only; print chunk counts without embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the ingested manuals.
    Ask {
        /// The question (5 to 500 characters).
        question: String,

        /// Maximum number of passages used to ground the answer.
        #[arg(long)]
        max_results: Option<i64>,

        /// Omit the cited passages from the output.
        #[arg(long)]
        no_sources: bool,
    },

    /// Show how a single PDF would be chunked.
    Split {
        /// PDF file to split.
        file: PathBuf,

        /// Chunk size in characters (default: `[documents].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap in characters (default: `[documents].chunk_overlap`).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Show vector index statistics. Requires a persistent index.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_or_default(cli.config.as_deref())?;
    init_logging(&cfg.logging);

    match cli.command {
        Commands::Serve => {
            let service = commands::build_service(&cfg)?;
            match service.attach().await {
                Ok(true) => {}
                Ok(false) => info!("Vector index is empty; waiting for POST /initialize"),
                Err(e) => warn!(error = %e, "Could not read index stats; starting uninitialized"),
            }
            server::run_server(&cfg, service).await?;
        }
        Commands::Ingest { dry_run } => {
            commands::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Ask {
            question,
            max_results,
            no_sources,
        } => {
            let service = commands::build_service(&cfg)?;
            commands::run_ask(&service, &question, max_results, !no_sources).await?;
        }
        Commands::Split {
            file,
            chunk_size,
            overlap,
        } => {
            let mut params = cfg.documents.chunk_params();
            if let Some(size) = chunk_size {
                anyhow::ensure!(size > 0, "--chunk-size must be > 0");
                params.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                params.overlap = overlap;
            }
            commands::run_split(&file, &params)?;
        }
        Commands::Stats => {
            commands::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
