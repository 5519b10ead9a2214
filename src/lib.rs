use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    #[error("Invalid metadata filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Backend '{0}' is not implemented")]
    NotImplemented(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    #[error("Ingestion of document {document_id} failed: {source}")]
    Ingestion {
        document_id: String,
        #[source]
        source: Box<RagError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Stable tag for each failure kind, used by the service layer to pick a status
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidChunkConfig(_) => "invalid_chunk_config",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::InvalidQuery(_) => "invalid_query",
            Self::UnsupportedContent(_) => "unsupported_content",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::NotImplemented(_) => "not_implemented",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Embedding(_) => "embedding_error",
            Self::Generation(_) => "generation_error",
            Self::Timeout { .. } => "timeout",
            Self::Ingestion { .. } => "ingestion_error",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether the failure was caused by the caller's input rather than a dependency
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidChunkConfig(_)
                | Self::InvalidFilter(_)
                | Self::InvalidQuery(_)
                | Self::UnsupportedContent(_)
                | Self::NotFound(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod orchestrator;
pub mod parsing;
pub mod pipeline;
