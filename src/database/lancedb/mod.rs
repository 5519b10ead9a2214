// LanceDB columnar table backend
// One table per collection; filter keys other than document_id are applied after decoding metadata

#[cfg(test)]
mod tests;

pub mod vector_store;

pub use vector_store::LanceTable;

use arrow::datatypes::{DataType, Field, Schema};
use itertools::Itertools;
use std::sync::Arc;

use crate::database::{MetadataFilter, MetadataValue};

pub(crate) const VECTOR_COLUMN: &str = "vector";

/// Table schema for chunks embedded with `vector_dim` dimensions
#[inline]
pub fn chunk_schema(vector_dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim,
            ),
            false,
        ),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// SQL string literal with embedded quotes doubled
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Predicate evaluated inside LanceDB, if the filter constrains `document_id` to a string
pub(crate) fn pushdown_predicate(filter: Option<&MetadataFilter>) -> Option<String> {
    match filter?.get("document_id")? {
        MetadataValue::Text(id) => Some(format!("document_id = {}", quote_literal(id))),
        _ => None,
    }
}

/// Whether `filter` has constraints the pushdown predicate does not cover
pub(crate) fn needs_residual_filter(filter: Option<&MetadataFilter>) -> bool {
    filter.is_some_and(|f| {
        let pushed = usize::from(pushdown_predicate(Some(f)).is_some());
        f.len() > pushed
    })
}

pub(crate) fn id_list_predicate(ids: &[String]) -> String {
    format!("id IN ({})", ids.iter().map(|id| quote_literal(id)).join(", "))
}
