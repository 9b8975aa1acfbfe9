use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{error, info, warn};

use crate::RagError;
use crate::config::Config;
use crate::database::sqlite::Database;
use crate::database::{LanceVectorStore, VectorStore};
use crate::embeddings::{OllamaClient, chunks_fingerprint};
use crate::pipeline::{BatchCommit, IngestObserver, IngestReport, RagPipeline, with_deadline};


/// Extensions accepted by `ingest`. Binary formats need an external
/// text extractor first.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

pub type CliPipeline = RagPipeline<OllamaClient, LanceVectorStore>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Document name to store under; defaults to the file name
    pub name: Option<String>,
    /// Forget the document before ingesting it again
    pub replace: bool,
    /// Continue an interrupted ingest from its committed cursor
    pub resume: bool,
}

/// Fails with `UnsupportedFormat` unless `path` has a plain-text extension
#[inline]
pub fn check_supported_format(path: &Path) -> crate::Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(RagError::UnsupportedFormat(format!(
            "'.{}' files need text extraction first (supported: {})",
            ext,
            SUPPORTED_EXTENSIONS.join(", ")
        ))),
        None => Err(RagError::UnsupportedFormat(format!(
            "{} has no file extension",
            path.display()
        ))),
    }
}

/// File name of `path`, used as the document name when none is given
#[inline]
pub fn default_document_name(path: &Path) -> crate::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::InvalidInput(format!("Cannot derive a document name from {}", path.display()))
        })
}

/// Read the text of a supported document
#[inline]
pub fn read_document(path: &Path) -> crate::Result<String> {
    check_supported_format(path)?;
    Ok(std::fs::read_to_string(path)?)
}

/// Build the Ollama + LanceDB pipeline described by `config`
#[inline]
pub async fn open_pipeline(config: &Config) -> Result<CliPipeline> {
    config.validate().context("Invalid configuration")?;

    let embedder = OllamaClient::new(&config.ollama)
        .context("Failed to create Ollama client")?
        .with_timeout(config.request_timeout());
    let store = LanceVectorStore::new(config)
        .await
        .context("Failed to open vector store")?;

    Ok(RagPipeline::from_config(config, embedder, store)?)
}

async fn open_registry(config: &Config) -> Result<Database> {
    Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize document registry")
}

/// Persists the committed cursor and drives the progress bar
struct RegistryObserver<'a> {
    database: &'a Database,
    namespace: &'a str,
    document_name: &'a str,
    bar: ProgressBar,
}

#[async_trait]
impl IngestObserver for RegistryObserver<'_> {
    async fn batch_committed(&self, commit: BatchCommit) -> crate::Result<()> {
        self.database
            .record_progress(self.namespace, self.document_name, commit.committed)
            .await
            .map_err(|e| RagError::Database(format!("{:#}", e)))?;
        self.bar.set_position(commit.committed as u64);
        Ok(())
    }
}

fn progress_bar(total: usize, start: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} chunks {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_position(start as u64);
    bar
}

/// Ingest a text file: chunk it, embed and store the chunks, and track
/// progress in the document registry.
#[inline]
pub async fn ingest_file(
    config: &Config,
    path: &Path,
    options: IngestOptions,
) -> Result<IngestReport> {
    let raw_text = read_document(path)?;
    let document_name = match options.name {
        Some(name) => name,
        None => default_document_name(path)?,
    };

    let pipeline = open_pipeline(config).await?;
    let namespace = pipeline.namespace().to_string();
    let deadline = config.request_timeout();

    let chunks: Vec<String> = pipeline
        .chunk(&raw_text)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect();

    if chunks.is_empty() {
        warn!("{} contains no usable text", path.display());
        println!("No usable text in {}; nothing was ingested.", path.display());
        return Ok(pipeline.ingest(&document_name, &chunks).await?);
    }

    let database = open_registry(config).await?;
    let fingerprint = chunks_fingerprint(&chunks);

    let start = if options.resume {
        let previous = database.get_document(&namespace, &document_name).await?;
        match previous.and_then(|doc| doc.resume_offset(chunks.len(), &fingerprint)) {
            Some(offset) => {
                println!(
                    "Resuming '{}' from chunk {} of {}",
                    document_name,
                    offset,
                    chunks.len()
                );
                offset
            }
            None => {
                info!("Nothing to resume for '{}', starting over", document_name);
                0
            }
        }
    } else {
        0
    };

    if options.replace {
        with_deadline(deadline, pipeline.forget(&document_name)).await?;
    }

    database
        .begin_document(&namespace, &document_name, chunks.len(), start, &fingerprint)
        .await?;

    let observer = RegistryObserver {
        database: &database,
        namespace: &namespace,
        document_name: &document_name,
        bar: progress_bar(chunks.len(), start),
    };
    observer.bar.set_message(document_name.clone());

    let outcome = with_deadline(
        deadline,
        pipeline.ingest_from(&document_name, &chunks, start, &observer),
    )
    .await;

    match outcome {
        Ok(report) => {
            observer.bar.finish_and_clear();
            database
                .complete_document(&namespace, &document_name)
                .await?;

            if let Err(e) = pipeline.store().optimize().await {
                warn!("Vector table optimization failed: {}", e);
            }

            println!(
                "Ingested '{}': {} chunks in {} batches (namespace '{}')",
                report.document_name, report.total_chunks, report.batches, namespace
            );
            Ok(report)
        }
        Err(err) => {
            observer.bar.abandon();

            let committed = match &err {
                RagError::Ingest { committed, .. } => *committed,
                _ => database
                    .get_document(&namespace, &document_name)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|doc| usize::try_from(doc.committed_chunks).ok())
                    .unwrap_or(start),
            };

            error!("Ingestion of '{}' failed: {}", document_name, err);
            if let Err(e) = database
                .fail_document(&namespace, &document_name, committed, &err.to_string())
                .await
            {
                warn!("Failed to record ingestion failure: {:#}", e);
            }

            Err(anyhow::Error::new(err).context(format!(
                "'{}' was not processed; {} of {} chunks are already searchable \
                 (rerun with --resume to continue)",
                document_name,
                committed,
                chunks.len()
            )))
        }
    }
}

/// Retrieve the context for `query`; with `with_prompt` the full system
/// prompt for the generation call is returned instead.
#[inline]
pub async fn ask(config: &Config, query: &str, with_prompt: bool) -> Result<String> {
    let pipeline = open_pipeline(config).await?;
    let context = with_deadline(config.request_timeout(), pipeline.retrieve(query)).await?;

    if context.is_empty() {
        warn!("No indexed content matched the query");
    }

    if with_prompt {
        Ok(crate::context::system_prompt(&context))
    } else {
        Ok(context)
    }
}

/// Remove a document's records and its registry entry
#[inline]
pub async fn forget_document(config: &Config, document_name: &str) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let namespace = pipeline.namespace().to_string();

    with_deadline(config.request_timeout(), pipeline.forget(document_name)).await?;

    let database = open_registry(config).await?;
    if database.delete_document(&namespace, document_name).await? {
        println!("Forgot '{}'", document_name);
    } else {
        println!(
            "'{}' was not in the registry; any stored records were removed",
            document_name
        );
    }

    Ok(())
}

/// List registered documents in the configured namespace
#[inline]
pub async fn list_documents(config: &Config) -> Result<()> {
    let namespace = &config.store.namespace;
    let database = open_registry(config).await?;
    let documents = database.list_documents(namespace).await?;

    if documents.is_empty() {
        println!("No documents have been ingested into '{}' yet.", namespace);
        println!("Use 'doc-rag ingest <path>' to add one.");
        return Ok(());
    }

    println!("Documents in '{}' ({} total):", namespace, documents.len());
    println!();

    for document in &documents {
        println!("📄 {}", document.name);
        println!("   Status: {}", document.status);
        println!(
            "   Chunks: {}/{} ({}%)",
            document.committed_chunks,
            document.total_chunks,
            document.progress_percent()
        );
        println!(
            "   Updated: {}",
            document.updated_date.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(message) = &document.error_message {
            println!("   Error: {}", message);
        }
        println!();
    }

    Ok(())
}

/// Show the health of the provider, the stores and the registry
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let namespace = &config.store.namespace;

    println!("📊 doc-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Registry Status:");
    match open_registry(config).await {
        Ok(database) => {
            println!("   ✅ SQLite: Connected");
            match database.statistics(namespace).await {
                Ok(stats) => {
                    println!("   📊 Documents: {}", stats.total_documents());
                    println!("   ✅ Completed: {}", stats.completed);
                    println!("   🔄 Indexing: {}", stats.indexing);
                    println!("   ⏳ Pending: {}", stats.pending);
                    println!("   ❌ Failed: {}", stats.failed);
                    println!("   📄 Committed Chunks: {}", stats.committed_chunks);
                }
                Err(e) => println!("   ⚠️  Statistics unavailable - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ SQLite: Failed to connect - {:#}", e),
    }

    println!();
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let health = tokio::task::spawn_blocking(move || client.health_check()).await;
            match health {
                Ok(Ok(())) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Model: {}", config.ollama.model);
                }
                Ok(Err(e)) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
                Err(e) => println!("   ❌ Ollama: Health check failed - {}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
    }

    println!();
    println!("🔍 Vector Store Status:");
    match LanceVectorStore::new(config).await {
        Ok(store) => {
            println!("   ✅ LanceDB: Connected (table '{}')", store.table_name());
            match store.vector_dimension().await {
                Ok(Some(dimension)) => println!("   🔢 Dimension: {}", dimension),
                Ok(None) => println!("   📭 Table not created yet"),
                Err(e) => println!("   ⚠️  Dimension unknown - {}", e),
            }
            match store.count(namespace, None).await {
                Ok(count) => println!("   📊 Records in '{}': {}", namespace, count),
                Err(e) => println!("   ⚠️  Record count unavailable - {}", e),
            }
        }
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'doc-rag ingest <path>' to add a text or Markdown document");
    println!("   • Use 'doc-rag ask <question>' to retrieve matching context");
    println!("   • Use 'doc-rag list' to see ingestion progress per document");

    Ok(())
}
