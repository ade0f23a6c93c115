//! # doc-qa CLI (`docqa`)
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init [--rebuild]` | Load the stored index or build one from the documents directory |
//! | `docqa ask "<question>"` | Answer a question, with sources and highlighting |
//! | `docqa add <files...>` | Index additional `.txt` / `.md` files |
//! | `docqa rebuild` | Rebuild the index from scratch |
//! | `docqa status` | Show whether an index exists and its size |
//! | `docqa serve` | Start the HTTP API |

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use doc_qa::config::{load_config, Config};
use doc_qa::loader::{is_supported, SUPPORTED_EXTENSIONS};
use doc_qa::pipeline::{validate_question, Pipeline};
use doc_qa::server::run_server;
use doc_qa::store::IndexStore;
use doc_qa::logging;

/// doc-qa: ask questions about a local document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Retrieval-augmented question answering over a local document corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the stored index, or build it from the documents directory.
    Init {
        /// Ignore any stored index and rebuild from the documents.
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Skip printing the highlighted answer.
        #[arg(long)]
        no_highlight: bool,
    },

    /// Add files to the index. Only `.txt` and `.md` are accepted.
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Rebuild the index from the documents directory.
    Rebuild,

    /// Show index status without building anything.
    Status,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.logging);

    match cli.command {
        Commands::Init { rebuild } => {
            let mut pipeline = Pipeline::from_config(&config)?;
            let chunks = pipeline.initialize(rebuild).await?;
            println!("Index ready: {} chunks", chunks);
        }
        Commands::Ask {
            question,
            no_highlight,
        } => {
            if let Err(message) = validate_question(&question) {
                bail!(message);
            }
            let mut pipeline = Pipeline::from_config(&config)?;
            pipeline.initialize(false).await?;
            let record = pipeline.ask(&question).await?;

            println!("{}", record.answer);
            println!();
            println!("Sources:");
            for source in &record.sources {
                println!("  - {}", source);
            }
            if !no_highlight {
                if let Some(highlighted) = record.highlighted_answer() {
                    println!();
                    println!("Highlighted:");
                    println!("{}", highlighted);
                }
            }
        }
        Commands::Add { files } => {
            if let Some(bad) = files.iter().find(|f| !is_supported(f)) {
                bail!(
                    "unsupported file type: {} (allowed: {})",
                    bad.display(),
                    SUPPORTED_EXTENSIONS.join(", ")
                );
            }
            let mut pipeline = Pipeline::from_config(&config)?;
            pipeline.initialize(false).await?;
            let report = pipeline.add_documents(&files).await?;

            for file in &report.added {
                println!("added {} ({} chunks)", file.source_path, file.chunks);
            }
            for failure in &report.failed {
                println!("failed: {}", failure);
            }
            println!("Total chunks: {}", report.total_chunks);
        }
        Commands::Rebuild => {
            let mut pipeline = Pipeline::from_config(&config)?;
            let chunks = pipeline.rebuild().await?;
            println!("Index rebuilt: {} chunks", chunks);
        }
        Commands::Status => print_status(&config),
        Commands::Serve => {
            let mut pipeline = Pipeline::from_config(&config)?;
            pipeline.initialize(false).await?;
            run_server(&config.server.bind, pipeline).await?;
        }
    }

    Ok(())
}

fn print_status(config: &Config) {
    let store = IndexStore::new(&config.paths.vector_store);
    println!("documents:    {}", config.paths.documents.display());
    println!("vector store: {}", store.root().display());

    if !store.exists() {
        println!("initialized:  false");
        return;
    }
    match store.load() {
        Ok(snapshot) => {
            println!("initialized:  true");
            println!("chunks:       {}", snapshot.index.size());
            println!("model:        {}", snapshot.embedding_model);
            println!("created:      {}", snapshot.created_at.to_rfc3339());
        }
        Err(e) => {
            println!("initialized:  false");
            println!("error:        {}", e);
        }
    }
}
