// Vector store layer
// A `Collection` fronts one `VectorBackend` chosen at startup and owns embedding of chunk text


pub mod collection;
pub mod lancedb;
pub mod memory;
pub mod models;
pub mod placeholder;
pub mod sqlite;

pub use collection::Collection;
pub use models::{
    Chunk, CollectionStats, Document, EmbeddedChunk, Metadata, MetadataFilter, MetadataValue,
    ScoredChunk, validate_metadata,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::config::Config;
use crate::{RagError, Result};

/// Storage strategy behind a collection, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// SQLite file with brute-force cosine ranking
    #[default]
    LocalIndex,
    /// LanceDB table
    ColumnarTable,
    /// Reserved backend that rejects every operation
    Unimplemented,
}

impl fmt::Display for BackendKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LocalIndex => "local-index",
            Self::ColumnarTable => "columnar-table",
            Self::Unimplemented => "unimplemented",
        })
    }
}

impl FromStr for BackendKind {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local-index" | "local_index" | "sqlite" => Ok(Self::LocalIndex),
            "columnar-table" | "columnar_table" | "lancedb" => Ok(Self::ColumnarTable),
            "unimplemented" | "placeholder" | "faiss" => Ok(Self::Unimplemented),
            other => Err(RagError::Config(format!("Unknown vector store backend: {other}"))),
        }
    }
}

/// Storage operations every backend provides
///
/// Backends receive already-embedded chunks and raw query vectors; embedding and
/// dimension checks happen in [`Collection`].
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn collection_name(&self) -> &str;

    /// Called before every operation; backends that cannot serve requests fail here
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Store all items or none of them
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<()>;

    /// Up to `top_k` chunks matching `filter`, by descending cosine similarity
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove every chunk matching `filter` and return how many were removed
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64>;

    async fn count(&self) -> Result<u64>;
}

/// Open the backend named by the store configuration
#[inline]
pub async fn open_backend(config: &Config) -> Result<Box<dyn VectorBackend>> {
    let dimension = usize::try_from(config.provider.embedding_dimension)
        .map_err(|e| RagError::Config(format!("Invalid embedding dimension: {e}")))?;
    let collection = config.store.collection_name.as_str();

    info!(
        "Opening {} backend for collection '{}'",
        config.store.backend, collection
    );

    let backend: Box<dyn VectorBackend> = match config.store.backend {
        BackendKind::LocalIndex => Box::new(
            sqlite::SqliteIndex::open(&config.local_index_path(), collection, dimension).await?,
        ),
        BackendKind::ColumnarTable => Box::new(
            lancedb::LanceTable::open(&config.lancedb_uri(), collection, dimension).await?,
        ),
        BackendKind::Unimplemented => Box::new(placeholder::PlaceholderBackend::new(collection)),
    };

    Ok(backend)
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Score candidates against `query` and keep the best `top_k`
///
/// Ties are broken by chunk id so repeated searches return the same order.
pub(crate) fn rank_by_similarity<I>(query: &[f32], candidates: I, top_k: usize) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (Chunk, Vec<f32>)>,
{
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|(chunk, vector)| ScoredChunk {
            score: cosine_similarity(query, &vector),
            chunk,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    scored.truncate(top_k);
    scored
}
