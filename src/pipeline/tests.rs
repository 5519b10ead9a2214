use super::*;
use crate::database::memory::MemoryIndex;
use crate::database::{Chunk, Metadata};
use crate::embeddings::fake::{FAKE_DIMENSION, FakeClient};
use std::sync::Arc;

fn hit(id: u32, len: usize, score: f32) -> ScoredChunk {
    let document = Document::with_id("doc", "", Metadata::new());
    ScoredChunk {
        chunk: Chunk::from_document(&document, id, 0, "x".repeat(len)),
        score,
    }
}

fn ids(context: &RetrievedContext) -> Vec<u32> {
    context.hits.iter().map(|h| h.chunk.chunk_index).collect()
}

#[test]
fn budget_accepts_in_rank_order() {
    let hits = vec![hit(0, 100, 0.9), hit(1, 100, 0.8), hit(2, 100, 0.7)];
    let context = apply_budget(hits, 250);

    assert_eq!(ids(&context), vec![0, 1]);
    assert_eq!(context.total_chars, 200);
}

#[test]
fn budget_stops_at_first_overflow() {
    // The third hit would fit on its own but acceptance stops at the second
    let hits = vec![hit(0, 100, 0.9), hit(1, 300, 0.8), hit(2, 10, 0.7)];
    let context = apply_budget(hits, 250);

    assert_eq!(ids(&context), vec![0]);
}

#[test]
fn exact_fit_is_accepted() {
    let hits = vec![hit(0, 100, 0.9), hit(1, 150, 0.8)];
    let context = apply_budget(hits, 250);

    assert_eq!(ids(&context), vec![0, 1]);
    assert_eq!(context.total_chars, 250);
}

#[test]
fn oversized_top_hit_is_returned_alone() {
    let hits = vec![hit(0, 500, 0.9), hit(1, 10, 0.8)];
    let context = apply_budget(hits, 250);

    assert_eq!(ids(&context), vec![0]);
    assert_eq!(context.total_chars, 500);
}

#[test]
fn no_hits_no_context() {
    let context = apply_budget(Vec::new(), 100);
    assert!(context.is_empty());
    assert_eq!(context.total_chars, 0);
}

#[test]
fn rejects_invalid_chunking() {
    assert!(RetrievalPipeline::new(ChunkingConfig { max_size: 10, overlap: 10 }).is_err());
}

#[tokio::test]
async fn retrieve_applies_budget_to_query_results() {
    let collection = Collection::new(
        Box::new(MemoryIndex::new("pipeline")),
        Arc::new(FakeClient::new()),
        FAKE_DIMENSION,
    );
    let pipeline = RetrievalPipeline::new(ChunkingConfig {
        max_size: 50,
        overlap: 0,
    })
    .expect("valid config");

    let document = Document::new(
        "Paris is the capital of France and sits on the Seine. ".repeat(4),
        Metadata::new(),
    );
    let chunks = pipeline.chunk(&document).expect("chunking");
    assert!(chunks.len() >= 4);
    collection.add(chunks).await.expect("add");

    let context = pipeline
        .retrieve(&collection, "capital of France", 5, None, 120)
        .await
        .expect("retrieve");

    assert!(!context.is_empty());
    assert!(context.total_chars <= 120);
    assert_eq!(context.texts().len(), context.hits.len());
}
