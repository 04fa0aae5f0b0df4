//! State shared between the controller and the running scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use roundtable_conversation::{ContextAssembler, History};
use roundtable_core::{SchedulerConfig, TtsClient};
use roundtable_memory::MemoryGateway;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::AgentRuntime;
use crate::status::{StatusPublisher, StatusSnapshot};

#[derive(Debug, Clone)]
pub(crate) struct SessionInfo {
    pub session_id: Option<Uuid>,
    pub topic: Option<String>,
    pub running: bool,
    pub rate: f64,
    pub turn_count: u64,
    pub current_speaker: Option<String>,
}

pub(crate) struct SessionShared {
    pub roster: Vec<Arc<AgentRuntime>>,
    pub history: History,
    pub info: RwLock<SessionInfo>,
    pub assembler: ContextAssembler,
    pub memory: Option<Arc<MemoryGateway>>,
    pub tts: Option<Arc<dyn TtsClient>>,
    pub config: SchedulerConfig,
    pub publisher: StatusPublisher,
    /// Serializes snapshot construction so `seq` follows causal order.
    publish_lock: Mutex<()>,
    /// Token of the turn currently executing, for `interrupt`.
    pub current_turn: Mutex<Option<CancellationToken>>,
    /// Cuts the inter-turn wait short.
    pub wake: Notify,
}

impl SessionShared {
    pub fn new(
        roster: Vec<Arc<AgentRuntime>>,
        assembler: ContextAssembler,
        memory: Option<Arc<MemoryGateway>>,
        tts: Option<Arc<dyn TtsClient>>,
        config: SchedulerConfig,
    ) -> Self {
        let rate = config.initial_rate;
        Self {
            roster,
            history: History::new(),
            info: RwLock::new(SessionInfo {
                session_id: None,
                topic: None,
                running: false,
                rate,
                turn_count: 0,
                current_speaker: None,
            }),
            assembler,
            memory,
            tts,
            config,
            publisher: StatusPublisher::new(StatusSnapshot::idle(rate)),
            publish_lock: Mutex::new(()),
            current_turn: Mutex::new(None),
            wake: Notify::new(),
        }
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<AgentRuntime>> {
        self.roster.iter().find(|agent| agent.name() == name)
    }

    pub fn participants(&self) -> Vec<String> {
        self.roster
            .iter()
            .map(|agent| agent.name().to_string())
            .collect()
    }

    /// Build a snapshot from the live state and publish it.
    ///
    /// Lock order: publish lock, session info, history, agents.
    pub async fn publish(&self) -> Arc<StatusSnapshot> {
        let _guard = self.publish_lock.lock().await;
        let info = self.info.read().await.clone();
        let messages = self.history.tail(self.config.snapshot_tail).await;

        let mut agents = BTreeMap::new();
        for agent in &self.roster {
            agents.insert(agent.name().to_string(), agent.view().await);
        }

        self.publisher.publish(StatusSnapshot {
            seq: 0,
            running: info.running,
            topic: info.topic,
            session_id: info.session_id,
            messages,
            agents,
            rate: info.rate,
            turn_count: info.turn_count,
            current_speaker: info.current_speaker,
            updated_at: Utc::now(),
        })
    }
}
