//! Scoped add/query/purge on top of an embedding provider and a vector store.

use std::sync::Arc;

use chrono::Utc;
use roundtable_core::EmbeddingProvider;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entry::{MemoryEntry, MemoryFilter, MemoryMetadata, ScoredMemory};
use crate::store::VectorStore;
use crate::MemoryError;

/// Entry point for per-agent long-term memory.
///
/// Every read and write is scoped by agent id; the session scope is optional
/// on reads so callers can widen a query to everything the agent remembers.
pub struct MemoryGateway {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(MemoryError::EmbeddingCount {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// Embed `text` and store it under `(session_id, agent_id)`.
    pub async fn add(
        &self,
        text: &str,
        session_id: Uuid,
        agent_id: &str,
        metadata: MemoryMetadata,
    ) -> Result<Uuid, MemoryError> {
        let embedding = self.embed_one(text).await?;
        let entry = MemoryEntry {
            id: Uuid::now_v7(),
            text: text.to_string(),
            embedding,
            sender: metadata.sender,
            session_id,
            agent_id: agent_id.to_string(),
            topic: metadata.topic,
            timestamp: Utc::now(),
            extra: metadata.extra,
        };
        let id = entry.id;
        self.store.insert(entry).await?;
        debug!("Stored memory {id} for agent {agent_id} in session {session_id}");
        Ok(id)
    }

    /// The `k` entries nearest to `text` for `agent_id`.
    ///
    /// With `Some(session_id)` only that session's entries are considered;
    /// with `None` every session of the agent is searched. The agent filter
    /// always applies.
    pub async fn query(
        &self,
        text: &str,
        session_id: Option<Uuid>,
        agent_id: &str,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embed_one(text).await?;
        let filter = MemoryFilter::agent(agent_id, session_id);
        self.store.search(&filter, &embedding, k).await
    }

    /// Delete every entry matching the given scope and return the count.
    ///
    /// Both scopes `None` clears the whole store.
    pub async fn purge(
        &self,
        agent_id: Option<&str>,
        session_id: Option<Uuid>,
    ) -> Result<usize, MemoryError> {
        let filter = MemoryFilter {
            agent_id: agent_id.map(str::to_string),
            session_id,
        };
        let removed = self.store.delete(&filter).await?;
        info!(
            "Purged {removed} memories (agent={:?}, session={:?})",
            agent_id, session_id
        );
        Ok(removed)
    }

    pub async fn count(
        &self,
        agent_id: Option<&str>,
        session_id: Option<Uuid>,
    ) -> Result<usize, MemoryError> {
        let filter = MemoryFilter {
            agent_id: agent_id.map(str::to_string),
            session_id,
        };
        self.store.count(&filter).await
    }
}
