// Request-level flows: ask, ask about a document, ingest, delete
// Holds no state of its own beyond shared handles to the collection and model client


use fancy_regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::database::memory::MemoryIndex;
use crate::database::{
    Collection, CollectionStats, Document, Metadata, MetadataFilter, MetadataValue, ScoredChunk,
    validate_metadata,
};
use crate::embeddings::{ChunkStats, ModelClient, PromptKind};
use crate::parsing::{DocumentParser, ExtractedContent, Transcriber};
use crate::pipeline::{RetrievalPipeline, RetrievedContext};
use crate::{RagError, Result};

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("valid regex")
});

/// Generated answer and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub prompt_kind: PromptKind,
    pub sources: Vec<SourceRef>,
}

/// Where a piece of retrieved context came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl From<&ScoredChunk> for SourceRef {
    #[inline]
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            chunk_id: hit.chunk.id.clone(),
            document_id: hit.chunk.document_id.clone(),
            score: hit.score,
            metadata: hit.chunk.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks_indexed: usize,
    pub stats: ChunkStats,
}

pub struct Orchestrator {
    collection: Arc<Collection>,
    client: Arc<dyn ModelClient>,
    pipeline: RetrievalPipeline,
    settings: RetrievalConfig,
}

impl Orchestrator {
    #[inline]
    pub fn new(
        collection: Arc<Collection>,
        client: Arc<dyn ModelClient>,
        settings: RetrievalConfig,
    ) -> Result<Self> {
        let pipeline = RetrievalPipeline::new(settings.chunking())?;
        if settings.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        Ok(Self {
            collection,
            client,
            pipeline,
            settings,
        })
    }

    #[inline]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    #[inline]
    pub fn settings(&self) -> &RetrievalConfig {
        &self.settings
    }

    /// Answer `query` from the persistent collection
    #[inline]
    pub async fn ask(&self, query: &str, filter: Option<&MetadataFilter>) -> Result<Answer> {
        let query = self.normalize_query(query)?;

        let context = self
            .pipeline
            .retrieve(
                &self.collection,
                &query,
                self.settings.top_k,
                filter,
                self.settings.context_budget,
            )
            .await?;

        let kind = if context.is_empty() {
            PromptKind::Plain
        } else {
            PromptKind::DocumentGrounded
        };
        self.answer(kind, &query, &context).await
    }

    /// Answer `query` from `document` alone, indexed only for this request
    #[inline]
    pub async fn ask_about_document(&self, query: &str, document: &Document) -> Result<Answer> {
        let query = self.normalize_query(query)?;
        if document.text.trim().is_empty() {
            return Err(RagError::UnsupportedContent(
                "Document contains no text".to_string(),
            ));
        }

        let scratch = Collection::new(
            Box::new(MemoryIndex::new(format!("adhoc-{}", document.id))),
            Arc::clone(&self.client),
            self.collection.dimension(),
        );
        let chunks = self.pipeline.chunk(document)?;
        let indexed = scratch.add(chunks).await?;
        debug!(
            "Indexed {} chunks of ad-hoc document {}",
            indexed, document.id
        );

        let context = self
            .pipeline
            .retrieve(
                &scratch,
                &query,
                self.settings.top_k,
                None,
                self.settings.context_budget,
            )
            .await?;

        self.answer(PromptKind::FileSpecific, &query, &context).await
    }

    /// Chunk and store `document` in the persistent collection
    #[inline]
    pub async fn ingest(&self, document: Document) -> Result<IngestReport> {
        if document.text.trim().is_empty() {
            return Err(RagError::UnsupportedContent(format!(
                "Document {} contains no text",
                document.id
            )));
        }
        validate_metadata(&document.metadata)?;

        let chunks = self.pipeline.chunk(&document)?;
        let stats = ChunkStats::from_chunks(&chunks);

        let chunks_indexed = self.collection.add(chunks).await.map_err(|source| {
            warn!("Ingestion of document {} failed: {}", document.id, source);
            RagError::Ingestion {
                document_id: document.id.clone(),
                source: Box::new(source),
            }
        })?;

        info!(
            "Ingested document {} as {} chunks",
            document.id, chunks_indexed
        );
        Ok(IngestReport {
            document_id: document.id,
            chunks_indexed,
            stats,
        })
    }

    /// Remove every chunk matching `filter`, failing with `NotFound` when nothing matched
    #[inline]
    pub async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        let removed = self.collection.delete(filter).await?;
        if removed == 0 {
            return Err(RagError::NotFound(
                "No chunks matched the delete filter".to_string(),
            ));
        }
        Ok(removed)
    }

    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<u64> {
        self.delete(&MetadataFilter::for_document(document_id))
            .await
            .map_err(|e| match e {
                RagError::NotFound(_) => {
                    RagError::NotFound(format!("Document {document_id} has no indexed chunks"))
                }
                other => other,
            })
    }

    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        self.collection.stats().await
    }

    /// Answer `query` about an uploaded file without storing it
    #[inline]
    pub async fn ask_about_upload(
        &self,
        parser: &dyn DocumentParser,
        query: &str,
        bytes: &[u8],
        extension: &str,
    ) -> Result<Answer> {
        let text = extract_text(parser, bytes, extension)?;
        let document = Document::new(text, Metadata::new());
        self.ask_about_document(query, &document).await
    }

    /// Store an uploaded file, tagging it with its filename
    #[inline]
    pub async fn ingest_upload(
        &self,
        parser: &dyn DocumentParser,
        bytes: &[u8],
        filename: &str,
        mut metadata: Metadata,
    ) -> Result<IngestReport> {
        let extension = crate::parsing::file_extension(filename).ok_or_else(|| {
            RagError::UnsupportedContent(format!("File {filename:?} has no extension"))
        })?;
        let text = extract_text(parser, bytes, &extension)?;

        metadata.insert("filename".to_string(), MetadataValue::from(filename));
        metadata.insert("source".to_string(), MetadataValue::from("file_upload"));

        self.ingest(Document::new(text, metadata)).await
    }

    /// Transcribe `audio` and answer it as a plain query
    #[inline]
    pub async fn ask_transcribed(
        &self,
        transcriber: &dyn Transcriber,
        audio: &[u8],
    ) -> Result<Answer> {
        let transcript = transcriber.transcribe(audio).await?;
        debug!("Transcribed {} bytes of audio", audio.len());
        self.ask(&transcript, None).await
    }

    /// Strip control characters, collapse whitespace, trim and cap the length
    #[inline]
    pub fn normalize_query(&self, query: &str) -> Result<String> {
        let stripped: String = query
            .chars()
            .filter(|c| c.is_whitespace() || !c.is_control())
            .collect();
        let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
        let normalized: String = collapsed
            .trim()
            .chars()
            .take(self.settings.max_query_chars)
            .collect();
        let normalized = normalized.trim_end().to_string();

        if normalized.is_empty() {
            return Err(RagError::InvalidQuery("Query is empty".to_string()));
        }
        Ok(normalized)
    }

    async fn answer(
        &self,
        kind: PromptKind,
        query: &str,
        context: &RetrievedContext,
    ) -> Result<Answer> {
        let text = self
            .client
            .generate_for(kind, query, &context.texts())
            .await?;

        debug!(
            "Generated {} answer from {} sources",
            kind,
            context.hits.len()
        );
        Ok(Answer {
            text,
            prompt_kind: kind,
            sources: context.hits.iter().map(SourceRef::from).collect(),
        })
    }
}

fn extract_text(parser: &dyn DocumentParser, bytes: &[u8], extension: &str) -> Result<String> {
    match parser.extract_text(bytes, extension)? {
        ExtractedContent::Text(text) => Ok(text),
        ExtractedContent::Binary(_) => Err(RagError::UnsupportedContent(format!(
            "No text could be extracted from .{extension} content"
        ))),
    }
}
