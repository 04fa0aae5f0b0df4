//! Integration tests for the memory gateway.
//!
//! These tests verify that:
//! - Concurrent writers from several agents never lose entries
//! - Nearest-neighbour ranking follows embedding similarity
//! - Purging one session leaves other sessions of the same agent intact

use std::sync::Arc;

use async_trait::async_trait;
use roundtable_core::{EmbeddingProvider, ProviderError};
use roundtable_memory::{InMemoryVectorStore, MemoryGateway, MemoryMetadata};
use uuid::Uuid;

/// Bag-of-words embedding over a fixed vocabulary.
struct VocabularyEmbedder;

const VOCABULARY: [&str; 6] = ["rust", "python", "memory", "safety", "garbage", "speed"];

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|word| if lower.contains(word) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

fn gateway() -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new(
        Arc::new(VocabularyEmbedder),
        Arc::new(InMemoryVectorStore::new()),
    ))
}

#[tokio::test]
async fn test_concurrent_adds_are_all_stored() {
    let memory = gateway();
    let session = Uuid::now_v7();

    let mut handles = Vec::new();
    for agent in ["A", "B", "C"] {
        for i in 0..10 {
            let memory = Arc::clone(&memory);
            handles.push(tokio::spawn(async move {
                memory
                    .add(
                        &format!("rust memory note {i}"),
                        session,
                        agent,
                        MemoryMetadata::new(agent),
                    )
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.expect("task").expect("add");
    }

    for agent in ["A", "B", "C"] {
        assert_eq!(memory.count(Some(agent), Some(session)).await.expect("count"), 10);
    }
    assert_eq!(memory.count(None, None).await.expect("count"), 30);
}

#[tokio::test]
async fn test_ranking_follows_similarity() {
    let memory = gateway();
    let session = Uuid::now_v7();
    for text in [
        "Python has garbage collection",
        "Rust gives memory safety without garbage collection",
        "Rust speed matches C",
    ] {
        memory
            .add(text, session, "A", MemoryMetadata::new("A"))
            .await
            .expect("add");
    }

    let hits = memory
        .query("rust memory safety", Some(session), "A", 2)
        .await
        .expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(
        hits[0].entry.text,
        "Rust gives memory safety without garbage collection"
    );
    assert!(hits[0].similarity >= hits[1].similarity);
}

#[tokio::test]
async fn test_purge_one_session_keeps_others() {
    let memory = gateway();
    let old = Uuid::now_v7();
    let new = Uuid::now_v7();
    memory
        .add("rust speed", old, "A", MemoryMetadata::new("A"))
        .await
        .expect("add");
    memory
        .add("rust safety", new, "A", MemoryMetadata::new("A"))
        .await
        .expect("add");

    assert_eq!(memory.purge(Some("A"), Some(old)).await.expect("purge"), 1);

    let remaining = memory.query("rust", None, "A", 5).await.expect("query");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].entry.session_id, new);
}
