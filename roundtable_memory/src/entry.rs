use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored memory. Immutable once inserted; only whole-entry purge removes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    pub sender: String,
    pub session_id: Uuid,
    pub agent_id: String,
    pub topic: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Caller-supplied attributes recorded alongside the embedded text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetadata {
    pub sender: String,
    pub topic: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MemoryMetadata {
    #[must_use]
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Scope selector. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFilter {
    pub agent_id: Option<String>,
    pub session_id: Option<Uuid>,
}

impl MemoryFilter {
    /// Entries belonging to one agent, optionally narrowed to a session.
    #[must_use]
    pub fn agent(agent_id: impl Into<String>, session_id: Option<Uuid>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            session_id,
        }
    }

    #[must_use]
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        let agent_ok = self
            .agent_id
            .as_ref()
            .is_none_or(|agent_id| entry.agent_id == *agent_id);
        let session_ok = self
            .session_id
            .is_none_or(|session_id| entry.session_id == session_id);
        agent_ok && session_ok
    }
}

#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub entry: MemoryEntry,
    /// Raw cosine similarity used for ranking
    pub similarity: f64,
}
