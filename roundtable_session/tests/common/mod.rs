//! Scripted collaborators shared by the session integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use roundtable_core::{
    AgentProfile, AudioRef, ChatMessage, ChatParams, ChatProvider, ChatResponse,
    EmbeddingProvider, Message, ProviderError, ProviderKind, SchedulerConfig, TtsClient, Usage,
};
use roundtable_session::SessionController;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer every call.
    Reply,
    /// Fail every call.
    Fail,
    /// Never answer the first call; answer later ones.
    HangFirst,
}

pub struct ScriptedProvider {
    name: String,
    behavior: Behavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
    pub started: Notify,
}

impl ScriptedProvider {
    pub fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(messages.to_vec());
        self.started.notify_one();

        match self.behavior {
            Behavior::Fail => Err(ProviderError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Behavior::HangFirst if call == 1 => std::future::pending().await,
            Behavior::Reply | Behavior::HangFirst => Ok(ChatResponse {
                content: format!("{} says #{call}", self.name),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 4,
                    total_tokens: 14,
                }),
            }),
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }
}

/// Bag-of-letters embedding.
pub struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0_f32; 26];
                for c in t.to_ascii_lowercase().bytes() {
                    if c.is_ascii_lowercase() {
                        v[usize::from(c - b'a')] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

pub struct OfflineEmbedder;

#[async_trait]
impl EmbeddingProvider for OfflineEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Unavailable("embedding service down".to_string()))
    }
}

pub struct FakeTts;

#[async_trait]
impl TtsClient for FakeTts {
    async fn speak(&self, text: &str) -> Option<AudioRef> {
        Some(AudioRef(format!("audio://{}", text.len())))
    }
}

pub fn fast_scheduler() -> SchedulerConfig {
    SchedulerConfig {
        base_delay_ms: 5,
        idle_poll_ms: 5,
        retry_delay_ms: 5,
        provider_timeout_secs: 5,
        ..SchedulerConfig::default()
    }
}

pub fn profile(name: &str) -> AgentProfile {
    AgentProfile::new(name, format!("{name} is a thoughtful panelist."))
}

/// Poll history until `done` holds, panicking after a few seconds.
pub async fn wait_for_history<F>(controller: &SessionController, done: F) -> Vec<Message>
where
    F: Fn(&[Message]) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let history = controller.history().await;
            if done(&history) {
                return history;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("history condition not reached in time")
}

pub fn spoken_by<'a>(history: &'a [Message], name: &str) -> Vec<&'a Message> {
    history.iter().filter(|m| m.sender == name).collect()
}
