use super::*;
use crate::database::BackendKind;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            provider: ProviderConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                ..ProviderConfig::default()
            },
            store: StoreConfig {
                backend: BackendKind::ColumnarTable,
                collection_name: "manuals".to_string(),
                ..StoreConfig::default()
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config = Config::load(temp_dir.path()).expect("should load config");

        assert_eq!(loaded_config.provider, original_config.provider);
        assert_eq!(loaded_config.store, original_config.store);
        assert_eq!(loaded_config.get_base_dir(), temp_dir.path());
    }

    #[test]
    fn invalid_toml_handling() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let invalid_toml = r#"
            [provider
            host = "localhost"
            port = "invalid_port"
        "#;
        fs::write(temp_dir.path().join("config.toml"), invalid_toml)
            .expect("should write config");

        assert!(Config::load(temp_dir.path()).is_err());
    }

    #[test]
    fn invalid_values_fail_load() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let toml = r#"
            [retrieval]
            chunk_size = 100
            chunk_overlap = 150
        "#;
        fs::write(temp_dir.path().join("config.toml"), toml).expect("should write config");

        assert!(Config::load(temp_dir.path()).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let toml = r#"
            [store]
            backend = "chroma"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn load_default_reads_environment() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        // SAFETY: serialized with every other test that touches the process environment
        unsafe {
            std::env::set_var("RAG_CORE_HOME", temp_dir.path());
            std::env::set_var("RAG_TOP_K", "9");
            std::env::set_var("RAG_BACKEND", "placeholder");
        }

        let result = Config::load_default();

        // SAFETY: still inside the serialized section
        unsafe {
            std::env::remove_var("RAG_CORE_HOME");
            std::env::remove_var("RAG_TOP_K");
            std::env::remove_var("RAG_BACKEND");
        }

        let config = result.expect("should load from environment");
        assert_eq!(config.get_base_dir(), temp_dir.path());
        assert_eq!(config.retrieval.top_k, 9);
        assert_eq!(config.store.backend, BackendKind::Unimplemented);
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::OverlapTooLarge(10, 5),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
