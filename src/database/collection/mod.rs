
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    BackendKind, Chunk, CollectionStats, EmbeddedChunk, MetadataFilter, ScoredChunk, VectorBackend,
    validate_metadata,
};
use crate::embeddings::ModelClient;
use crate::{RagError, Result};

const DEFAULT_EMBED_BATCH: usize = 16;

/// Embeds chunk text and delegates storage to the configured backend
pub struct Collection {
    backend: Box<dyn VectorBackend>,
    client: Arc<dyn ModelClient>,
    dimension: usize,
    batch_size: usize,
}

impl Collection {
    #[inline]
    pub fn new(backend: Box<dyn VectorBackend>, client: Arc<dyn ModelClient>, dimension: usize) -> Self {
        Self {
            backend,
            client,
            dimension,
            batch_size: DEFAULT_EMBED_BATCH,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.backend.collection_name()
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed and store `chunks`, returning how many were stored
    ///
    /// Metadata is checked and every chunk embedded before anything is written, so a
    /// failing batch leaves the collection unchanged.
    #[inline]
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        self.backend.ensure_ready().await?;

        if chunks.is_empty() {
            return Ok(0);
        }
        for chunk in &chunks {
            validate_metadata(&chunk.metadata)?;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self.client.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Provider returned {} embeddings for {} inputs",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }

        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        let items: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();
        let count = items.len();

        self.backend.insert(items).await?;

        info!("Stored {} chunks in collection '{}'", count, self.name());
        Ok(count)
    }

    /// Nearest chunks to `text`, restricted to those matching `filter`
    #[inline]
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        self.backend.ensure_ready().await?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let filter = filter.filter(|f| !f.is_empty());
        if let Some(f) = filter {
            f.validate()?;
        }

        let vector = self.client.embed(text).await?;
        self.check_dimension(&vector)?;

        let mut results = self.backend.search(&vector, top_k, filter).await?;
        results.truncate(top_k);

        debug!(
            "Query against '{}' returned {} results",
            self.name(),
            results.len()
        );
        Ok(results)
    }

    /// Remove all chunks matching `filter`; an empty filter is rejected
    #[inline]
    pub async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        self.backend.ensure_ready().await?;

        if filter.is_empty() {
            return Err(RagError::InvalidFilter(
                "Refusing to delete with an empty filter".to_string(),
            ));
        }
        filter.validate()?;

        let removed = self.backend.delete(filter).await?;
        info!("Deleted {} chunks from collection '{}'", removed, self.name());
        Ok(removed)
    }

    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        self.backend.ensure_ready().await?;

        Ok(CollectionStats {
            chunk_count: self.backend.count().await?,
            collection_name: self.name().to_string(),
            backend_kind: self.kind(),
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }
}
