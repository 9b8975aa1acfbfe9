use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use doc_rag::commands::{
    IngestOptions, ask, forget_document, ingest_file, list_documents, show_status,
};
use doc_rag::config::{Config, resolve_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "doc-rag")]
#[command(about = "Ingest documents into a vector store and retrieve context for questions")]
#[command(version)]
struct Cli {
    /// Configuration and data directory (defaults to ~/.doc-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Vector store namespace to operate on, overriding the configured one
    #[arg(long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and vector store settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store a text or Markdown document
    Ingest {
        /// Path of the document
        path: PathBuf,
        /// Name to store the document under (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Remove previously stored chunks of the document first
        #[arg(long, conflicts_with = "resume")]
        replace: bool,
        /// Continue an interrupted ingest from its last committed chunk
        #[arg(long)]
        resume: bool,
    },
    /// Retrieve the context matching a question
    Ask {
        /// The question
        query: String,
        /// Print the full system prompt for the generation model
        #[arg(long)]
        prompt: bool,
    },
    /// Remove every stored chunk of a document
    Forget {
        /// Document name
        name: String,
    },
    /// List ingested documents
    List,
    /// Show detailed status of the provider and stores
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    if let Commands::Config { show: false } = cli.command {
        return run_interactive_config(&config_dir);
    }

    let mut config = Config::load(&config_dir)?;
    if let Some(namespace) = cli.namespace {
        config.store.set_namespace(namespace)?;
    }

    match cli.command {
        Commands::Config { .. } => {
            show_config(&config);
        }
        Commands::Ingest {
            path,
            name,
            replace,
            resume,
        } => {
            ingest_file(
                &config,
                &path,
                IngestOptions {
                    name,
                    replace,
                    resume,
                },
            )
            .await?;
        }
        Commands::Ask { query, prompt } => {
            let output = ask(&config, &query, prompt).await?;
            if output.is_empty() {
                eprintln!("No uploaded material matches this question.");
            } else {
                println!("{}", output);
            }
        }
        Commands::Forget { name } => {
            forget_document(&config, &name).await?;
        }
        Commands::List => {
            list_documents(&config).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
