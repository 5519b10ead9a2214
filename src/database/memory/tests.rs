use super::*;
use crate::database::{Chunk, Document, Metadata};

fn embedded(document_id: &str, index: u32, vector: Vec<f32>) -> EmbeddedChunk {
    let document = Document::with_id(document_id, "text", Metadata::new());
    EmbeddedChunk {
        chunk: Chunk::from_document(&document, index, 0, format!("{document_id} chunk {index}")),
        vector,
    }
}

#[tokio::test]
async fn search_orders_by_similarity() {
    let index = MemoryIndex::new("adhoc");
    index
        .insert(vec![
            embedded("a", 0, vec![1.0, 0.0]),
            embedded("a", 1, vec![0.7, 0.7]),
            embedded("a", 2, vec![0.0, 1.0]),
        ])
        .await
        .expect("insert");

    let results = index.search(&[1.0, 0.1], 2, None).await.expect("search");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.id, "a:0");
    assert_eq!(results[1].chunk.id, "a:1");
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn filter_and_delete() {
    let index = MemoryIndex::new("adhoc");
    index
        .insert(vec![
            embedded("a", 0, vec![1.0, 0.0]),
            embedded("b", 0, vec![1.0, 0.0]),
        ])
        .await
        .expect("insert");

    let only_b = MetadataFilter::for_document("b");
    let results = index
        .search(&[1.0, 0.0], 10, Some(&only_b))
        .await
        .expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.document_id, "b");

    assert_eq!(index.delete(&only_b).await.expect("delete"), 1);
    assert_eq!(index.delete(&only_b).await.expect("delete"), 0);
    assert_eq!(index.count().await.expect("count"), 1);
}

#[tokio::test]
async fn reinserting_replaces_chunk() {
    let index = MemoryIndex::new("adhoc");
    index
        .insert(vec![embedded("a", 0, vec![1.0, 0.0])])
        .await
        .expect("insert");
    index
        .insert(vec![embedded("a", 0, vec![0.0, 1.0])])
        .await
        .expect("insert");

    assert_eq!(index.count().await.expect("count"), 1);
    let results = index.search(&[0.0, 1.0], 1, None).await.expect("search");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}
