use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.provider.protocol, "http");
    assert_eq!(config.provider.host, "localhost");
    assert_eq!(config.provider.port, 11434);
    assert_eq!(config.provider.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.store.backend, BackendKind::LocalIndex);
    assert_eq!(config.store.collection_name, "rag_documents");
    assert_eq!(config.retrieval.chunk_size, 1000);
    assert_eq!(config.retrieval.chunk_overlap, 200);
    assert_eq!(config.retrieval.context_budget, 4000);
    assert_eq!(config.retrieval.top_k, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.provider.protocol = "ftp".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.provider.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.chunk_overlap = invalid_config.retrieval.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.context_budget = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.store.collection_name = "bad name'".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidCollectionName(_))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial = r#"
        [store]
        backend = "columnar-table"

        [retrieval]
        top_k = 3
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.store.backend, BackendKind::ColumnarTable);
    assert_eq!(config.store.collection_name, "rag_documents");
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.retrieval.chunk_size, 1000);
    assert_eq!(config.provider, ProviderConfig::default());
}

#[test]
fn env_overrides() {
    let mut config = Config::default();
    let env = env_map(&[
        ("RAG_BACKEND", "lancedb"),
        ("RAG_COLLECTION", "handbook"),
        ("RAG_CHUNK_SIZE", "500"),
        ("RAG_CHUNK_OVERLAP", "50"),
        ("RAG_CONTEXT_BUDGET", "1500"),
        ("RAG_TOP_K", "8"),
        ("RAG_OLLAMA_HOST", "ollama.internal"),
        ("RAG_GENERATION_MODEL", "mistral"),
    ]);

    config
        .apply_env_overrides(|name| env.get(name).cloned())
        .expect("overrides should apply");

    assert_eq!(config.store.backend, BackendKind::ColumnarTable);
    assert_eq!(config.store.collection_name, "handbook");
    assert_eq!(config.retrieval.chunk_size, 500);
    assert_eq!(config.retrieval.chunk_overlap, 50);
    assert_eq!(config.retrieval.context_budget, 1500);
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.provider.host, "ollama.internal");
    assert_eq!(config.provider.generation_model, "mistral");
    assert!(config.validate().is_ok());
}

#[test]
fn env_override_rejects_garbage() {
    let mut config = Config::default();
    let env = env_map(&[("RAG_TOP_K", "many")]);

    let result = config.apply_env_overrides(|name| env.get(name).cloned());
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvValue { ref name, .. }) if name == "RAG_TOP_K"
    ));

    let env = env_map(&[("RAG_BACKEND", "chroma")]);
    let result = config.apply_env_overrides(|name| env.get(name).cloned());
    assert!(result.is_err());
}

#[test]
fn storage_paths_default_under_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("missing config falls back to defaults");

    assert_eq!(config.local_index_path(), temp_dir.path().join("index.db"));
    assert_eq!(
        config.lancedb_uri(),
        temp_dir.path().join("vectors").to_string_lossy()
    );
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("defaults");
    config.retrieval.top_k = 7;
    config.store.backend = BackendKind::ColumnarTable;
    config.save().expect("save should succeed");

    let reloaded = Config::load(temp_dir.path()).expect("reload should succeed");
    assert_eq!(reloaded, config);
}

#[test]
fn setter_validation() {
    let mut provider = ProviderConfig::default();

    assert!(provider.set_protocol("https".to_string()).is_ok());
    assert!(provider.set_host("example.com".to_string()).is_ok());
    assert!(provider.set_port(8080).is_ok());
    assert!(provider.set_embedding_model("new-model".to_string()).is_ok());
    assert!(provider.set_generation_model("gen-model".to_string()).is_ok());
    assert!(provider.set_embedding_dimension(384).is_ok());

    assert!(provider.set_protocol("ftp".to_string()).is_err());
    assert!(provider.set_port(0).is_err());
    assert!(provider.set_embedding_model("   ".to_string()).is_err());
    assert!(provider.set_generation_model(String::new()).is_err());
    assert!(provider.set_embedding_dimension(1).is_err());
    assert!(provider.set_embedding_dimension(5000).is_err());
}
