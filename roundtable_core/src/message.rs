//! History entries and the metadata attached to generated turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Usage;

/// Which family of backend produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAiCompatible,
    LocalInference,
    Custom,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAiCompatible => write!(f, "openai_compatible"),
            Self::LocalInference => write!(f, "local_inference"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Opaque handle to synthesized audio, owned by the TTS collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AudioRef(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationMeta {
    pub provider: ProviderKind,
    pub model: String,
    pub latency_ms: u64,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Produced by a scheduled agent turn.
    Agent,
    /// Added out of band through the controller.
    Injected,
    /// Synthesized replacement for a summarized prefix of history.
    Summary,
}

/// One entry of session history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<GenerationMeta>,
}

impl Message {
    #[must_use]
    pub fn new(sender: impl Into<String>, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: sender.into(),
            content: content.into(),
            kind,
            timestamp: Utc::now(),
            audio: None,
            meta: None,
        }
    }

    /// A message produced by an agent turn.
    #[must_use]
    pub fn from_agent(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageKind::Agent)
    }

    #[must_use]
    pub fn injected(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageKind::Injected)
    }

    #[must_use]
    pub fn summary(content: impl Into<String>) -> Self {
        Self::new("summary", content, MessageKind::Summary)
    }

    #[must_use]
    pub fn with_audio(mut self, audio: Option<AudioRef>) -> Self {
        self.audio = audio;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: GenerationMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    #[must_use]
    pub const fn is_summary(&self) -> bool {
        matches!(self.kind, MessageKind::Summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::from_agent("alice", "hi");
        let b = Message::from_agent("alice", "hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, MessageKind::Agent);
    }

    #[test]
    fn test_summary_message() {
        let m = Message::summary("earlier they agreed");
        assert!(m.is_summary());
        assert_eq!(m.sender, "summary");
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_provider_kind_display_matches_serde() {
        for kind in [
            ProviderKind::OpenAiCompatible,
            ProviderKind::LocalInference,
            ProviderKind::Custom,
        ] {
            let json = serde_json::to_string(&kind).expect("serialize provider kind");
            assert_eq!(json.trim_matches('"'), kind.to_string());
        }
    }
}
