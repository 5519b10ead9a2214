use async_trait::async_trait;
use tracing::warn;

use super::{BackendKind, EmbeddedChunk, MetadataFilter, ScoredChunk, VectorBackend};
use crate::{RagError, Result};

/// Selectable backend with no storage behind it; every operation fails with `NotImplemented`
#[derive(Debug, Clone)]
pub struct PlaceholderBackend {
    name: String,
}

impl PlaceholderBackend {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn unavailable(&self) -> RagError {
        warn!(
            "Rejected operation on collection '{}': backend not implemented",
            self.name
        );
        RagError::NotImplemented(BackendKind::Unimplemented.to_string())
    }
}

#[async_trait]
impl VectorBackend for PlaceholderBackend {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::Unimplemented
    }

    #[inline]
    fn collection_name(&self) -> &str {
        &self.name
    }

    #[inline]
    async fn ensure_ready(&self) -> Result<()> {
        Err(self.unavailable())
    }

    #[inline]
    async fn insert(&self, _items: Vec<EmbeddedChunk>) -> Result<()> {
        Err(self.unavailable())
    }

    #[inline]
    async fn search(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        Err(self.unavailable())
    }

    #[inline]
    async fn delete(&self, _filter: &MetadataFilter) -> Result<u64> {
        Err(self.unavailable())
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        Err(self.unavailable())
    }
}
