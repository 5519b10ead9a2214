#[cfg(test)]
mod tests;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    BackendKind, EmbeddedChunk, MetadataFilter, ScoredChunk, VectorBackend, rank_by_similarity,
};
use crate::Result;

/// Process-local index for documents that only live for a single request
#[derive(Debug, Default)]
pub struct MemoryIndex {
    name: String,
    entries: RwLock<Vec<EmbeddedChunk>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorBackend for MemoryIndex {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::LocalIndex
    }

    #[inline]
    fn collection_name(&self) -> &str {
        &self.name
    }

    #[inline]
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<()> {
        let mut entries = self.entries.write().await;
        for item in items {
            entries.retain(|existing| existing.chunk.id != item.chunk.id);
            entries.push(item);
        }
        debug!("Memory index '{}' holds {} chunks", self.name, entries.len());
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().await;
        let candidates = entries
            .iter()
            .filter(|e| filter.is_none_or(|f| f.matches(&e.chunk.metadata)))
            .map(|e| (e.chunk.clone(), e.vector.clone()));
        Ok(rank_by_similarity(vector, candidates, top_k))
    }

    #[inline]
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !filter.matches(&e.chunk.metadata));
        Ok((before - entries.len()) as u64)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().await.len() as u64)
    }
}
