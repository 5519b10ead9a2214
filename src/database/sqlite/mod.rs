
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use super::{
    BackendKind, Chunk, EmbeddedChunk, Metadata, MetadataFilter, MetadataValue, ScoredChunk,
    VectorBackend, rank_by_similarity,
};
use crate::{RagError, Result};

pub type DbPool = Pool<Sqlite>;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Persistent local index: one SQLite file, brute-force cosine ranking in process
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    pool: DbPool,
    collection: String,
    dimension: usize,
}

impl SqliteIndex {
    /// Open (creating if needed) the index file and register `collection`
    ///
    /// Fails with `DimensionMismatch` when the collection was created with another dimension.
    #[inline]
    pub async fn open(path: &Path, collection: &str, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::StoreUnavailable(format!(
                    "Failed to create index directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_error("Failed to open local index"))?;

        let index = Self {
            pool,
            collection: collection.to_string(),
            dimension,
        };
        index.init_schema().await?;
        index.register_collection().await?;

        info!(
            "Local index ready at {} (collection '{}', dimension {})",
            path.display(),
            collection,
            dimension
        );
        Ok(index)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error("Failed to create chunks table"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(collection, document_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error("Failed to create chunk index"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error("Failed to create collections table"))?;

        debug!("Local index schema initialized");
        Ok(())
    }

    async fn register_collection(&self) -> Result<()> {
        let stored: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error("Failed to read collection metadata"))?;

        match stored {
            Some(stored) => {
                let stored = usize::try_from(stored).unwrap_or(0);
                if stored != self.dimension {
                    return Err(RagError::DimensionMismatch {
                        expected: stored,
                        actual: self.dimension,
                    });
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                )
                .bind(&self.collection)
                .bind(i64::try_from(self.dimension).unwrap_or(i64::MAX))
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await
                .map_err(store_error("Failed to register collection"))?;
                info!(
                    "Registered collection '{}' with dimension {}",
                    self.collection, self.dimension
                );
            }
        }
        Ok(())
    }

    /// `WHERE` clause over the collection plus one `json_extract` equality per filter key
    fn where_clause(filter: Option<&MetadataFilter>) -> String {
        let mut clause = "collection = ?".to_string();
        for (key, _) in filter.into_iter().flat_map(MetadataFilter::iter) {
            clause.push_str(" AND json_extract(metadata, '$.");
            clause.push_str(key);
            clause.push_str("') = ?");
        }
        clause
    }

    fn bind_filter<'q>(
        &'q self,
        mut query: SqliteQuery<'q>,
        filter: Option<&'q MetadataFilter>,
    ) -> SqliteQuery<'q> {
        query = query.bind(self.collection.as_str());
        for (_, value) in filter.into_iter().flat_map(MetadataFilter::iter) {
            query = match value {
                MetadataValue::Text(s) => query.bind(s.as_str()),
                MetadataValue::Integer(i) => query.bind(*i),
                MetadataValue::Float(f) => query.bind(*f),
            };
        }
        query
    }

    fn row_to_candidate(row: &SqliteRow) -> Result<(Chunk, Vec<f32>)> {
        let metadata_str: String = row.get("metadata");
        let metadata: Metadata = serde_json::from_str(&metadata_str)
            .map_err(|e| RagError::StoreUnavailable(format!("Corrupt chunk metadata: {e}")))?;
        let chunk_index: i64 = row.get("chunk_index");
        let blob: Vec<u8> = row.get("embedding");

        let chunk = Chunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            chunk_index: u32::try_from(chunk_index).unwrap_or(u32::MAX),
            text: row.get("text"),
            metadata,
        };
        Ok((chunk, deserialize_embedding(&blob)))
    }
}

fn store_error(context: &'static str) -> impl Fn(sqlx::Error) -> RagError {
    move |e| RagError::StoreUnavailable(format!("{context}: {e}"))
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl VectorBackend for SqliteIndex {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::LocalIndex
    }

    #[inline]
    fn collection_name(&self) -> &str {
        &self.collection
    }

    #[inline]
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        for item in &items {
            let metadata = serde_json::to_string(&item.chunk.metadata)
                .map_err(|e| RagError::StoreUnavailable(format!("Failed to encode metadata: {e}")))?;

            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                    (collection, id, document_id, chunk_index, text, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&self.collection)
            .bind(&item.chunk.id)
            .bind(&item.chunk.document_id)
            .bind(i64::from(item.chunk.chunk_index))
            .bind(&item.chunk.text)
            .bind(metadata)
            .bind(serialize_embedding(&item.vector))
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to insert chunk"))?;
        }

        tx.commit()
            .await
            .map_err(store_error("Failed to commit chunk batch"))?;

        debug!(
            "Inserted {} chunks into collection '{}'",
            items.len(),
            self.collection
        );
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        if let Some(f) = filter {
            f.validate()?;
        }

        let sql = format!(
            "SELECT id, document_id, chunk_index, text, metadata, embedding FROM chunks WHERE {}",
            Self::where_clause(filter)
        );
        let rows = self
            .bind_filter(sqlx::query(&sql), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error("Failed to scan chunks"))?;

        let candidates = rows
            .iter()
            .map(Self::row_to_candidate)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Ranking {} candidate chunks in collection '{}'",
            candidates.len(),
            self.collection
        );
        Ok(rank_by_similarity(vector, candidates, top_k))
    }

    #[inline]
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        filter.validate()?;

        let sql = format!("DELETE FROM chunks WHERE {}", Self::where_clause(Some(filter)));
        let result = self
            .bind_filter(sqlx::query(&sql), Some(filter))
            .execute(&self.pool)
            .await
            .map_err(store_error("Failed to delete chunks"))?;

        Ok(result.rows_affected())
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error("Failed to count chunks"))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
