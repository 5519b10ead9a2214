use anyhow::Result;
use clap::{Parser, Subcommand};
use rag_core::commands::{ask, check_health, delete_document, ingest_paths, show_stats};
use rag_core::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-core")]
#[command(about = "Retrieval-augmented question answering over your own documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider, vector store and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store files (directories are walked recursively)
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Metadata attached to every ingested document, as key=value
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Ask a question grounded in the indexed documents
    Ask {
        query: String,
        /// Answer from this file only instead of the collection
        #[arg(long)]
        file: Option<PathBuf>,
        /// Restrict retrieval to chunks whose metadata matches, as key=value
        #[arg(long = "filter", value_name = "KEY=VALUE", conflicts_with = "file")]
        filter: Vec<String>,
    },
    /// Delete every chunk of a document
    Delete {
        /// Document ID reported by `ingest`
        document_id: String,
    },
    /// Show collection statistics
    Stats,
    /// Check that the Ollama server and configured models are available
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { paths, meta } => {
            ingest_paths(&Config::load_default()?, &paths, &meta).await?;
        }
        Commands::Ask {
            query,
            file,
            filter,
        } => {
            ask(&Config::load_default()?, &query, file.as_deref(), &filter).await?;
        }
        Commands::Delete { document_id } => {
            delete_document(&Config::load_default()?, &document_id).await?;
        }
        Commands::Stats => {
            show_stats(&Config::load_default()?).await?;
        }
        Commands::Health => {
            check_health(&Config::load_default()?).await?;
        }
    }

    Ok(())
}
