
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    VECTOR_COLUMN, chunk_schema, id_list_predicate, needs_residual_filter, pushdown_predicate,
};
use crate::database::{
    BackendKind, Chunk, EmbeddedChunk, Metadata, MetadataFilter, ScoredChunk, VectorBackend,
};
use crate::{RagError, Result};

/// Collection stored as a LanceDB table searched by cosine distance
pub struct LanceTable {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

impl LanceTable {
    /// Connect to `uri` and open or create the table for `table_name`
    ///
    /// An existing table with a different vector dimension is an error; it is never recreated.
    #[inline]
    pub async fn open(uri: &str, table_name: &str, dimension: usize) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(uri).map_err(|e| {
                RagError::StoreUnavailable(format!(
                    "Failed to create vector database directory: {e}"
                ))
            })?;
        }

        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(lance_error("Failed to connect to LanceDB"))?;

        let store = Self {
            connection,
            table_name: table_name.to_string(),
            dimension,
        };
        store.initialize_table().await?;

        info!(
            "LanceDB table '{}' ready with {} dimensions",
            table_name, dimension
        );
        Ok(store)
    }

    fn vector_dim(&self) -> Result<i32> {
        i32::try_from(self.dimension).map_err(|_| {
            RagError::Config(format!("Embedding dimension {} is too large", self.dimension))
        })
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(lance_error("Failed to list tables"))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: self.dimension,
                });
            }
            debug!("Table '{}' already exists", self.table_name);
            return Ok(());
        }

        self.connection
            .create_empty_table(&self.table_name, chunk_schema(self.vector_dim()?))
            .execute()
            .await
            .map_err(lance_error("Failed to create table"))?;

        info!("Created LanceDB table '{}'", self.table_name);
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(lance_error("Failed to get table schema"))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == VECTOR_COLUMN)
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::StoreUnavailable(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(lance_error("Failed to open table"))
    }

    fn create_record_batch(&self, items: &[EmbeddedChunk]) -> Result<RecordBatch> {
        let len = items.len();
        let vector_dim = self.vector_dim()?;
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut document_ids = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut metadata = Vec::with_capacity(len);

        for item in items {
            ids.push(item.chunk.id.as_str());
            flat_values.extend_from_slice(&item.vector);
            document_ids.push(item.chunk.document_id.as_str());
            chunk_indices.push(item.chunk.chunk_index);
            texts.push(item.chunk.text.as_str());
            metadata.push(serde_json::to_string(&item.chunk.metadata).map_err(|e| {
                RagError::StoreUnavailable(format!("Failed to encode metadata: {e}"))
            })?);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::StoreUnavailable(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(chunk_schema(vector_dim), arrays)
            .map_err(|e| RagError::StoreUnavailable(format!("Failed to create record batch: {e}")))
    }

    /// Decode one result batch; `_distance` is present only for vector searches
    fn parse_batch(batch: &RecordBatch) -> Result<Vec<(Chunk, f32)>> {
        let ids = string_column(batch, "id")?;
        let document_ids = string_column(batch, "document_id")?;
        let texts = string_column(batch, "text")?;
        let metadata = string_column(batch, "metadata")?;
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
            .ok_or_else(|| {
                RagError::StoreUnavailable("Missing or invalid chunk_index column".to_string())
            })?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        (0..batch.num_rows())
            .map(|row| {
                let metadata: Metadata = serde_json::from_str(metadata.value(row)).map_err(|e| {
                    RagError::StoreUnavailable(format!("Corrupt chunk metadata: {e}"))
                })?;
                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                let chunk = Chunk {
                    id: ids.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    text: texts.value(row).to_string(),
                    metadata,
                };
                Ok((chunk, 1.0 - distance))
            })
            .collect()
    }

    async fn collect_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<(Chunk, f32)>> {
        let mut rows = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(lance_error("Failed to read result stream"))?
        {
            rows.extend(Self::parse_batch(&batch)?);
        }

        Ok(rows)
    }

    /// All chunks matching `filter`, without scores
    async fn scan(&self, table: &Table, filter: &MetadataFilter) -> Result<Vec<Chunk>> {
        let predicate = pushdown_predicate(Some(filter));
        let candidates = table
            .count_rows(predicate.clone())
            .await
            .map_err(lance_error("Failed to count rows"))?;
        if candidates == 0 {
            return Ok(Vec::new());
        }

        let mut query = table
            .query()
            .select(Select::columns(&[
                "id",
                "document_id",
                "chunk_index",
                "text",
                "metadata",
            ]))
            .limit(candidates);
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }

        let stream = query
            .execute()
            .await
            .map_err(lance_error("Failed to scan table"))?;

        Ok(Self::collect_stream(stream)
            .await?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .filter(|chunk| filter.matches(&chunk.metadata))
            .collect())
    }
}

fn lance_error(context: &'static str) -> impl Fn(lancedb::Error) -> RagError {
    move |e| RagError::StoreUnavailable(format!("{context}: {e}"))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RagError::StoreUnavailable(format!("Missing or invalid {name} column")))
}

#[async_trait]
impl VectorBackend for LanceTable {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::ColumnarTable
    }

    #[inline]
    fn collection_name(&self) -> &str {
        &self.table_name
    }

    /// Upserts the whole batch on chunk id in a single commit
    #[inline]
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<()> {
        if items.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let record_batch = self.create_record_batch(&items)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(lance_error("Failed to upsert chunks"))?;

        debug!(
            "Stored {} chunks in table '{}'",
            items.len(),
            self.table_name
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

        let table = self.open_table().await?;
        let predicate = pushdown_predicate(filter);

        let candidates = table
            .count_rows(predicate.clone())
            .await
            .map_err(lance_error("Failed to count rows"))?;
        if candidates == 0 {
            return Ok(Vec::new());
        }

        // Residual keys are checked after decoding, so every pushed-down candidate is fetched
        let limit = if needs_residual_filter(filter) {
            candidates
        } else {
            top_k.min(candidates)
        };

        let mut query = table
            .vector_search(vector)
            .map_err(lance_error("Failed to create vector search"))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(limit);
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }

        let stream = query
            .execute()
            .await
            .map_err(lance_error("Failed to execute search"))?;

        let mut results: Vec<ScoredChunk> = Self::collect_stream(stream)
            .await?
            .into_iter()
            .filter(|(chunk, _)| filter.is_none_or(|f| f.matches(&chunk.metadata)))
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        results.truncate(top_k);

        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    #[inline]
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        filter.validate()?;

        let table = self.open_table().await?;
        let ids: Vec<String> = self
            .scan(&table, filter)
            .await?
            .into_iter()
            .map(|chunk| chunk.id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        table
            .delete(&id_list_predicate(&ids))
            .await
            .map_err(lance_error("Failed to delete chunks"))?;

        info!(
            "Deleted {} chunks from table '{}'",
            ids.len(),
            self.table_name
        );
        Ok(ids.len() as u64)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(lance_error("Failed to count rows"))?;

        Ok(count as u64)
    }
}
