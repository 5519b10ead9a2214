// Deterministic offline client for unit tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ModelClient;
use crate::{RagError, Result};

pub const FAKE_DIMENSION: usize = 64;

/// Embeds text as normalized hashed character trigrams; identical text has similarity 1.0
#[derive(Debug, Default)]
pub struct FakeClient {
    pub embed_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub fail_embedding_after: Option<usize>,
    pub dimension_override: Option<usize>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

pub fn hashed_trigrams(text: &str, dimension: usize) -> Vec<f32> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut vector = vec![0.0_f32; dimension];

    for gram in chars.windows(3) {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for c in gram {
            hash ^= u64::from(*c);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % dimension as u64) as usize] += 1.0;
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
impl ModelClient for FakeClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let calls = self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embedding_after.is_some_and(|limit| calls >= limit) {
            return Err(RagError::Embedding("fake provider failure".to_string()));
        }
        Ok(hashed_trigrams(
            text,
            self.dimension_override.unwrap_or(FAKE_DIMENSION),
        ))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(format!("answer ({} prompt chars)", prompt.chars().count()))
    }
}
