
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, UploadConfig};
use crate::database::{Collection, Document, Metadata, MetadataFilter, open_backend};
use crate::embeddings::{ModelClient, OllamaClient};
use crate::orchestrator::{Answer, Orchestrator};
use crate::parsing::{BasicParser, DocumentParser, ExtractedContent, validate_upload};

/// Wire the configured backend and Ollama client into an orchestrator
#[inline]
pub async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let client: Arc<dyn ModelClient> = Arc::new(
        OllamaClient::new(&config.provider).context("Failed to create Ollama client")?,
    );

    let backend = open_backend(config)
        .await
        .context("Failed to open vector store")?;
    let collection = Collection::new(
        backend,
        Arc::clone(&client),
        config.provider.embedding_dimension as usize,
    )
    .with_batch_size(config.provider.batch_size as usize);

    Ok(Orchestrator::new(
        Arc::new(collection),
        client,
        config.retrieval.clone(),
    )?)
}

/// Parse `key=value` pairs into document metadata
#[inline]
pub fn parse_metadata(pairs: &[String]) -> Result<Metadata> {
    let filter = MetadataFilter::from_pairs(pairs).context("Invalid metadata")?;
    Ok(filter
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect())
}

/// Expand directories into the regular files beneath them, sorted for stable ordering
///
/// Symlinks inside a directory are skipped rather than followed.
#[inline]
#[expect(
    clippy::filetype_is_file,
    reason = "symlinks and special files are excluded on purpose"
)]
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Per-run ingestion counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct IngestSummary {
    ingested: usize,
    chunks: usize,
    skipped: usize,
    failed: usize,
}

impl IngestSummary {
    /// Report the counts; any failed file makes the run an error
    fn finish(self) -> Result<()> {
        println!(
            "Ingested {} files ({} chunks), skipped {}, failed {}.",
            self.ingested, self.chunks, self.skipped, self.failed
        );
        if self.failed > 0 {
            anyhow::bail!(
                "{} of {} files failed to ingest",
                self.failed,
                self.ingested + self.skipped + self.failed
            );
        }
        Ok(())
    }
}

/// Ingest every supported file under `paths`
#[inline]
pub async fn ingest_paths(config: &Config, paths: &[PathBuf], meta: &[String]) -> Result<()> {
    let metadata = parse_metadata(meta)?;
    let files = collect_files(paths)?;
    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    let orchestrator = build_orchestrator(config).await?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(files.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut summary = IngestSummary::default();

    for file in &files {
        let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        bar.set_message(filename.to_string());

        match ingest_file(config, &orchestrator, file, &metadata).await {
            Ok(Some(report)) => {
                summary.ingested += 1;
                summary.chunks += report.chunks_indexed;
                bar.println(format!(
                    "✓ {} → document {} ({} chunks)",
                    file.display(),
                    report.document_id,
                    report.chunks_indexed
                ));
            }
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                error!("Failed to ingest {}: {:#}", file.display(), e);
                bar.println(format!("✗ {}: {:#}", file.display(), e));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    summary.finish()
}

async fn ingest_file(
    config: &Config,
    orchestrator: &Orchestrator,
    file: &Path,
    metadata: &Metadata,
) -> Result<Option<crate::orchestrator::IngestReport>> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Unreadable file name: {}", file.display()))?;
    let size = std::fs::metadata(file)
        .with_context(|| format!("Failed to read {}", file.display()))?
        .len();

    if let Err(e) = validate_upload(filename, size, &config.upload) {
        warn!("Skipping {}: {}", file.display(), e);
        return Ok(None);
    }

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let report = orchestrator
        .ingest_upload(&BasicParser, &bytes, filename, metadata.clone())
        .await?;

    info!("Ingested {} as {}", file.display(), report.document_id);
    Ok(Some(report))
}

/// Answer `query`, either from the collection or from a single local file
#[inline]
pub async fn ask(
    config: &Config,
    query: &str,
    file: Option<&Path>,
    filter: &[String],
) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;

    let answer = match file {
        Some(path) => {
            let document = load_document(path, &config.upload)?;
            orchestrator.ask_about_document(query, &document).await?
        }
        None => {
            let filter = MetadataFilter::from_pairs(filter).context("Invalid filter")?;
            orchestrator.ask(query, Some(&filter)).await?
        }
    };

    print_answer(&answer);
    Ok(())
}

fn load_document(path: &Path, limits: &UploadConfig) -> Result<Document> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    let extension = validate_upload(&path.to_string_lossy(), size, limits)?;
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match BasicParser.extract_text(&bytes, &extension)? {
        ExtractedContent::Text(text) => {
            let mut metadata = Metadata::new();
            metadata.insert(
                "filename".to_string(),
                path.file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
                    .into(),
            );
            Ok(Document::new(text, metadata))
        }
        ExtractedContent::Binary(_) => Err(anyhow::anyhow!(
            "{} has no text content",
            path.display()
        )),
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim());

    if answer.sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for source in &answer.sources {
        let label = source
            .metadata
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or(source.document_id.as_str());
        println!("  [{:.3}] {} ({})", source.score, label, source.chunk_id);
    }
}

/// Remove every chunk of a document
#[inline]
pub async fn delete_document(config: &Config, document_id: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let removed = orchestrator.delete_document(document_id).await?;
    println!("Deleted {removed} chunks of document {document_id}");
    Ok(())
}

#[inline]
pub async fn show_stats(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let stats = orchestrator.stats().await?;

    println!("Collection: {}", stats.collection_name);
    println!("Backend:    {}", stats.backend_kind);
    println!("Chunks:     {}", stats.chunk_count);
    Ok(())
}

/// Check the Ollama server and both configured models
#[inline]
pub async fn check_health(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.provider)?;

    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task failed")?;

    match result {
        Ok(()) => {
            println!(
                "✅ Ollama reachable at {}:{}",
                config.provider.host, config.provider.port
            );
            println!("   Embedding model:  {}", config.provider.embedding_model);
            println!("   Generation model: {}", config.provider.generation_model);
            Ok(())
        }
        Err(e) => {
            println!("❌ Ollama health check failed: {e:#}");
            Err(e)
        }
    }
}
