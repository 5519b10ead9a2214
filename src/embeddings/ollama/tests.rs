use super::*;

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "embed-model".to_string(),
        generation_model: "gen-model".to_string(),
        batch_size: 128,
        retry_attempts: 4,
        ..ProviderConfig::default()
    }
}

#[test]
fn client_configuration() {
    let client = OllamaClient::new(&provider_config()).expect("Failed to create client");

    assert_eq!(client.embedding_model, "embed-model");
    assert_eq!(client.generation_model, "gen-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 4);
    assert_eq!(client.backoff, DEFAULT_BACKOFF);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&ProviderConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(0)
        .with_backoff(Duration::from_millis(10));

    assert_eq!(client.retry_attempts, 1);
    assert_eq!(client.backoff, Duration::from_millis(10));
    assert_eq!(DEFAULT_RETRY_ATTEMPTS, ProviderConfig::default().retry_attempts);
}

#[test]
fn provider_errors_map_to_rag_errors() {
    let timeout = ProviderError::Timeout.into_rag("embedding", RagError::Embedding);
    assert!(matches!(timeout, RagError::Timeout { ref operation } if operation == "embedding"));

    let client = ProviderError::Client(404).into_rag("generation", RagError::Generation);
    assert!(matches!(client, RagError::Generation(ref msg) if msg.contains("404")));

    let other = ProviderError::Request("boom".to_string()).into_rag("embedding", RagError::Embedding);
    assert!(matches!(other, RagError::Embedding(_)));
}

#[test]
fn model_validation_accepts_latest_tag() {
    let models = vec![
        ModelInfo {
            name: "nomic-embed-text:latest".to_string(),
            size: None,
            digest: None,
            details: None,
        },
        ModelInfo {
            name: "llama3.2:3b".to_string(),
            size: None,
            digest: None,
            details: None,
        },
    ];

    assert!(OllamaClient::validate_model(&models, "nomic-embed-text").is_ok());
    assert!(OllamaClient::validate_model(&models, "nomic-embed-text:latest").is_ok());
    assert!(OllamaClient::validate_model(&models, "llama3.2:3b").is_ok());
    assert!(OllamaClient::validate_model(&models, "llama3.2").is_err());
}

#[test]
fn request_bodies() {
    let input = vec!["a".to_string(), "b".to_string()];
    let embed = serde_json::to_value(EmbedRequest {
        model: "m",
        input: &input,
    })
    .expect("serializes");
    assert_eq!(embed, serde_json::json!({"model": "m", "input": ["a", "b"]}));

    let generate = serde_json::to_value(GenerateRequest {
        model: "m",
        prompt: "p",
        stream: false,
    })
    .expect("serializes");
    assert_eq!(
        generate,
        serde_json::json!({"model": "m", "prompt": "p", "stream": false})
    );
}

#[test]
fn empty_batch_makes_no_request() {
    // Port 9 is discard; any request would fail
    let config = ProviderConfig {
        port: 9,
        ..ProviderConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    let vectors = client.embed_texts(&[]).expect("no request needed");
    assert!(vectors.is_empty());
}
