
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::{RagError, Result};

/// A single metadata value attached to documents and chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Exact-match comparison used by filters; integers and floats compare numerically
    #[inline]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64) == *f
            }
            _ => false,
        }
    }

    /// Parse a command-line value, preferring integer, then float, then text
    #[inline]
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Integer(i);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Floats must be finite; NaN and infinities have no JSON encoding
    #[inline]
    pub fn is_storable(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::Integer(_) | Self::Text(_) => true,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for MetadataValue {
    #[inline]
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Reject metadata that could not be stored and read back
#[inline]
pub fn validate_metadata(metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        if !value.is_storable() {
            return Err(RagError::UnsupportedContent(format!(
                "metadata value {value} for key {key:?} is not a finite number"
            )));
        }
    }
    Ok(())
}

/// Conjunction of exact-match key/value constraints on chunk metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(BTreeMap<String, MetadataValue>);

impl MetadataFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching every chunk of one document
    #[inline]
    pub fn for_document(document_id: &str) -> Self {
        Self::new().with("document_id", document_id)
    }

    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// True when every constrained key is present in `metadata` with an equal value
    #[inline]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| actual.matches(expected))
        })
    }

    /// Keys must be plain identifiers and float values finite
    #[inline]
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.0 {
            if !is_identifier(key) {
                return Err(RagError::InvalidFilter(format!(
                    "metadata key {key:?} must match [A-Za-z_][A-Za-z0-9_]*"
                )));
            }
            if !value.is_storable() {
                return Err(RagError::InvalidFilter(format!(
                    "value {value} for key {key:?} is not a finite number"
                )));
            }
        }
        Ok(())
    }

    /// Parse `key=value` pairs as given on the command line
    #[inline]
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                RagError::InvalidFilter(format!("expected key=value, got {pair:?}"))
            })?;
            filter.insert(key.trim(), MetadataValue::parse_loose(value.trim()));
        }
        filter.validate()?;
        Ok(filter)
    }
}

impl FromIterator<(String, MetadataValue)> for MetadataFilter {
    #[inline]
    fn from_iter<T: IntoIterator<Item = (String, MetadataValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A unit of source content submitted for ingestion or ad-hoc querying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata,
        }
    }

    #[inline]
    pub fn with_id(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }
}

/// A contiguous window of a document's text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Build a chunk of `document`, tagging it with its position in the source text
    #[inline]
    pub fn from_document(
        document: &Document,
        chunk_index: u32,
        start_offset: usize,
        text: String,
    ) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert(
            "document_id".to_string(),
            MetadataValue::Text(document.id.clone()),
        );
        metadata.insert(
            "chunk_index".to_string(),
            MetadataValue::from(chunk_index),
        );
        metadata.insert(
            "start_offset".to_string(),
            MetadataValue::Integer(i64::try_from(start_offset).unwrap_or(i64::MAX)),
        );

        Self {
            id: Self::make_id(&document.id, chunk_index),
            document_id: document.id.clone(),
            chunk_index,
            text,
            metadata,
        }
    }

    #[inline]
    pub fn make_id(document_id: &str, chunk_index: u32) -> String {
        format!("{document_id}:{chunk_index}")
    }
}

/// A chunk paired with its embedding, as handed to a backend for storage
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A retrieved chunk with its cosine similarity to the query (higher is better)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub chunk_count: u64,
    pub collection_name: String,
    pub backend_kind: super::BackendKind,
}
