#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::database::BackendKind;
use crate::embeddings::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
const HOME_ENV_VAR: &str = "RAG_CORE_HOME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the Ollama server used for both embedding and generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for ProviderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 16,
            timeout_seconds: 60,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub collection_name: String,
    /// SQLite file for the local index; defaults to `<base_dir>/index.db`
    pub local_index_path: Option<PathBuf>,
    /// LanceDB directory; defaults to `<base_dir>/vectors`
    pub lancedb_uri: Option<String>,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: BackendKind::LocalIndex,
            collection_name: "rag_documents".to_string(),
            local_index_path: None,
            lancedb_uri: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Maximum characters of retrieved chunk text passed to generation
    pub context_budget: usize,
    pub top_k: usize,
    pub max_query_chars: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            context_budget: 4000,
            top_k: 5,
            max_query_chars: 4000,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            allowed_extensions: ["txt", "md", "markdown", "html", "htm"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 2 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid collection name: {0:?} (letters, digits, '_' and '-' only)")]
    InvalidCollectionName(String),
    #[error("Invalid chunk size: {0} (must be between 50 and 20000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid context budget: {0} (must be at least 1)")]
    InvalidContextBudget(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid max query length: {0} (must be at least 1)")]
    InvalidMaxQueryChars(usize),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnvValue { name: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Resolve the home directory: `RAG_CORE_HOME` if set, otherwise `~/.rag-core`
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
            return Ok(PathBuf::from(home));
        }

        dirs::home_dir()
            .map(|home| home.join(".rag-core"))
            .or_else(|| dirs::data_dir().map(|data| data.join("rag-core")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from the default home, apply environment overrides and validate
    #[inline]
    pub fn load_default() -> Result<Self> {
        let base_dir = Self::default_base_dir().context("Failed to resolve home directory")?;
        let mut config = Self::load(&base_dir)?;
        config
            .apply_env_overrides(|name| std::env::var(name).ok())
            .context("Failed to apply environment overrides")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Override settings from environment variables
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map instead.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RAG_BACKEND") {
            self.store.backend = value.parse().map_err(|_| ConfigError::InvalidEnvValue {
                name: "RAG_BACKEND".to_string(),
                value,
            })?;
        }
        if let Some(value) = lookup("RAG_COLLECTION") {
            self.store.collection_name = value;
        }
        if let Some(value) = lookup("RAG_LOCAL_INDEX_PATH") {
            self.store.local_index_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("RAG_LANCEDB_URI") {
            self.store.lancedb_uri = Some(value);
        }
        if let Some(value) = lookup("RAG_CHUNK_SIZE") {
            self.retrieval.chunk_size = parse_env("RAG_CHUNK_SIZE", value)?;
        }
        if let Some(value) = lookup("RAG_CHUNK_OVERLAP") {
            self.retrieval.chunk_overlap = parse_env("RAG_CHUNK_OVERLAP", value)?;
        }
        if let Some(value) = lookup("RAG_CONTEXT_BUDGET") {
            self.retrieval.context_budget = parse_env("RAG_CONTEXT_BUDGET", value)?;
        }
        if let Some(value) = lookup("RAG_TOP_K") {
            self.retrieval.top_k = parse_env("RAG_TOP_K", value)?;
        }
        if let Some(value) = lookup("RAG_OLLAMA_HOST") {
            self.provider.host = value;
        }
        if let Some(value) = lookup("RAG_OLLAMA_PORT") {
            self.provider.port = parse_env("RAG_OLLAMA_PORT", value)?;
        }
        if let Some(value) = lookup("RAG_EMBEDDING_MODEL") {
            self.provider.embedding_model = value;
        }
        if let Some(value) = lookup("RAG_GENERATION_MODEL") {
            self.provider.generation_model = value;
        }
        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.validate_store_config()?;
        self.validate_retrieval_config()?;
        Ok(())
    }

    fn validate_store_config(&self) -> Result<(), ConfigError> {
        let name = &self.store.collection_name;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::InvalidCollectionName(name.clone()));
        }
        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if !(50..=20_000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        if config.context_budget == 0 {
            return Err(ConfigError::InvalidContextBudget(config.context_budget));
        }

        if !(1..=100).contains(&config.top_k) {
            return Err(ConfigError::InvalidTopK(config.top_k));
        }

        if config.max_query_chars == 0 {
            return Err(ConfigError::InvalidMaxQueryChars(config.max_query_chars));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Path of the SQLite file backing the local index
    #[inline]
    pub fn local_index_path(&self) -> PathBuf {
        self.store
            .local_index_path
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("index.db"))
    }

    /// Location of the LanceDB database directory
    #[inline]
    pub fn lancedb_uri(&self) -> String {
        self.store.lancedb_uri.clone().unwrap_or_else(|| {
            self.get_base_dir()
                .join("vectors")
                .to_string_lossy()
                .into_owned()
        })
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.provider.ollama_url()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            name: name.to_string(),
            value,
        })
}

impl ProviderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}://:{}",
                self.protocol, self.port
            )));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(2..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    #[inline]
    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    #[inline]
    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = ProviderConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    #[inline]
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(2..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}
