use async_trait::async_trait;
use rayon::prelude::*;
use tokio::sync::RwLock;
use tracing::debug;

use crate::entry::{MemoryEntry, MemoryFilter, ScoredMemory};
use crate::scoring::cosine_similarity;
use crate::MemoryError;

/// Vector-similarity storage backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert(&self, entry: MemoryEntry) -> Result<(), MemoryError>;

    /// Nearest entries to `query` among those matching `filter`, most similar first.
    async fn search(
        &self,
        filter: &MemoryFilter,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError>;

    /// Remove every matching entry and return how many were removed.
    async fn delete(&self, filter: &MemoryFilter) -> Result<usize, MemoryError>;

    async fn count(&self, filter: &MemoryFilter) -> Result<usize, MemoryError>;
}

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn search(
        &self,
        filter: &MemoryFilter,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredMemory> = entries
            .par_iter()
            .filter(|entry| filter.matches(entry))
            .map(|entry| ScoredMemory {
                similarity: cosine_similarity(query, &entry.embedding),
                entry: entry.clone(),
            })
            .collect();
        drop(entries);

        // Ties go to the newer entry
        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.entry.timestamp.cmp(&a.entry.timestamp))
        });
        scored.truncate(top_k);

        debug!("Vector search returned {} entries", scored.len());
        Ok(scored)
    }

    async fn delete(&self, filter: &MemoryFilter) -> Result<usize, MemoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !filter.matches(entry));
        Ok(before - entries.len())
    }

    async fn count(&self, filter: &MemoryFilter) -> Result<usize, MemoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn entry(agent: &str, session: Uuid, embedding: Vec<f32>) -> MemoryEntry {
        MemoryEntry {
            id: Uuid::now_v7(),
            text: format!("{agent} memory"),
            embedding,
            sender: agent.to_string(),
            session_id: session,
            agent_id: agent.to_string(),
            topic: None,
            timestamp: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        let session = Uuid::now_v7();
        store
            .insert(entry("a", session, vec![1.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert(entry("a", session, vec![0.7, 0.7]))
            .await
            .expect("insert");
        store
            .insert(entry("a", session, vec![0.0, 1.0]))
            .await
            .expect("insert");

        let hits = store
            .search(&MemoryFilter::agent("a", None), &[1.0, 0.0], 2)
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert!(hits[0].similarity > hits[1].similarity);
        assert_eq!(hits[0].entry.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn test_delete_counts_and_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let session = Uuid::now_v7();
        store
            .insert(entry("a", session, vec![1.0]))
            .await
            .expect("insert");
        store
            .insert(entry("b", session, vec![1.0]))
            .await
            .expect("insert");

        let filter = MemoryFilter::agent("a", None);
        assert_eq!(store.delete(&filter).await.expect("delete"), 1);
        assert_eq!(store.delete(&filter).await.expect("delete"), 0);
        assert_eq!(
            store
                .count(&MemoryFilter::default())
                .await
                .expect("count"),
            1
        );
    }
}
