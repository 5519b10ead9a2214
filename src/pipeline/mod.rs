#[cfg(test)]
mod tests;

use tracing::debug;

use crate::Result;
use crate::database::{Chunk, Collection, Document, MetadataFilter, ScoredChunk};
use crate::embeddings::chunking::{self, ChunkingConfig};

/// Retrieved chunks that fit the context budget, in rank order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub hits: Vec<ScoredChunk>,
    pub total_chars: usize,
}

impl RetrievedContext {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn texts(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.chunk.text.clone()).collect()
    }
}

/// Chunking on the way in, budgeted retrieval on the way out
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalPipeline {
    chunking: ChunkingConfig,
}

impl RetrievalPipeline {
    #[inline]
    pub fn new(chunking: ChunkingConfig) -> Result<Self> {
        chunking.validate()?;
        Ok(Self { chunking })
    }

    #[inline]
    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    #[inline]
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        chunking::chunk_document(document, &self.chunking)
    }

    /// Query `collection` and keep ranked hits while their combined text fits `context_budget`
    #[inline]
    pub async fn retrieve(
        &self,
        collection: &Collection,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
        context_budget: usize,
    ) -> Result<RetrievedContext> {
        let hits = collection.query(query, top_k, filter).await?;
        let context = apply_budget(hits, context_budget);

        debug!(
            "Retrieved {} chunks ({} chars) for budget {}",
            context.hits.len(),
            context.total_chars,
            context_budget
        );
        Ok(context)
    }
}

/// Greedy acceptance in rank order, stopping before the running total would exceed `budget`
///
/// A top-ranked chunk that alone exceeds the budget is still returned, by itself.
#[inline]
pub fn apply_budget(hits: Vec<ScoredChunk>, budget: usize) -> RetrievedContext {
    let mut context = RetrievedContext::default();

    for hit in hits {
        let len = hit.chunk.text.chars().count();
        if context.hits.is_empty() {
            context.total_chars = len;
            context.hits.push(hit);
            if len > budget {
                break;
            }
            continue;
        }
        if context.total_chars + len > budget {
            break;
        }
        context.total_chars += len;
        context.hits.push(hit);
    }

    context
}
