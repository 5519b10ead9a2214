// Offline model client shared by the integration tests

use async_trait::async_trait;
use rag_core::Result;
use rag_core::config::Config;
use rag_core::database::BackendKind;
use rag_core::embeddings::ModelClient;
use std::path::Path;
use std::sync::Mutex;

pub const DIMENSION: usize = 64;

/// Embeds text as normalized hashed character trigrams
#[derive(Debug, Default)]
pub struct HashingClient {
    pub prompts: Mutex<Vec<String>>,
}

impl HashingClient {
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

pub fn embed(text: &str) -> Vec<f32> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut vector = vec![0.0_f32; DIMENSION];

    for gram in chars.windows(3) {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for c in gram {
            hash ^= u64::from(*c);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    } else {
        vector[0] = 1.0;
    }
    vector
}

#[async_trait]
impl ModelClient for HashingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed(text))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok("generated answer".to_string())
    }
}

/// Configuration rooted at `base_dir` with small chunks and the test dimension
pub fn test_config(base_dir: &Path, backend: BackendKind) -> Config {
    let mut config = Config {
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    };
    config.store.backend = backend;
    config.store.collection_name = "integration".to_string();
    config.provider.embedding_dimension = DIMENSION as u32;
    config.retrieval.chunk_size = 1000;
    config.retrieval.chunk_overlap = 100;
    config.retrieval.context_budget = 4000;
    config.retrieval.top_k = 3;
    config
}

/// Distinct sentences so every chunk has its own trigram profile
pub fn distinct_prose(chars: usize) -> String {
    (0_u64..)
        .map(|i| format!("Entry {i:04} records sample value {}. ", (i * 7919) % 10007))
        .flat_map(|s| s.chars().collect::<Vec<_>>())
        .take(chars)
        .collect()
}
