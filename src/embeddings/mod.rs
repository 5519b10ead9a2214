// Embedding and generation
// Provider access sits behind `ModelClient`; chunking and prompt templates are pure helpers

pub mod chunking;
#[cfg(test)]
pub(crate) mod fake;
pub mod ollama;
pub mod prompts;

pub use chunking::{ChunkStats, ChunkingConfig, TextWindow, chunk_document, split_text};
pub use ollama::OllamaClient;
pub use prompts::PromptKind;

use async_trait::async_trait;

use crate::Result;

/// Text embedding and completion provider
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Render the template for `kind` and generate a completion for it
    async fn generate_for(
        &self,
        kind: PromptKind,
        query: &str,
        context: &[String],
    ) -> Result<String> {
        let prompt = prompts::render(kind, query, context);
        self.generate(&prompt).await
    }
}
