//! Public control surface of a discussion session.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::BoxStream;
use roundtable_conversation::{ContextAssembler, ExtractiveSummarizer};
use roundtable_core::{
    AgentProfile, ChatProvider, HistoryConfig, Message, RetrievalConfig, SchedulerConfig,
    Summarizer, TtsClient,
};
use roundtable_memory::MemoryGateway;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentRuntime, AgentRuntimeState, Transition};
use crate::error::SessionError;
use crate::scheduler::TurnScheduler;
use crate::shared::SessionShared;
use crate::status::StatusSnapshot;

struct RunningSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns one session: its roster, history and scheduler task.
///
/// At most one scheduler runs at a time. Each controller is independent, so
/// several can coexist in one process.
pub struct SessionController {
    shared: Arc<SessionShared>,
    lifecycle: Mutex<Option<RunningSession>>,
}

impl SessionController {
    #[must_use]
    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::default()
    }

    /// Start a fresh session on `topic`.
    ///
    /// History is cleared and every agent is reset to Active.
    pub async fn start(&self, topic: impl Into<String>) -> Result<Arc<StatusSnapshot>, SessionError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let topic = topic.into();
        let session_id = Uuid::now_v7();
        {
            let mut info = self.shared.info.write().await;
            info.session_id = Some(session_id);
            info.topic = Some(topic.clone());
            info.running = true;
            info.turn_count = 0;
            info.current_speaker = None;
        }
        self.shared.history.clear().await;
        for agent in &self.shared.roster {
            agent.reset().await;
        }

        info!("Starting session {session_id} on topic: {topic}");
        let snapshot = self.shared.publish().await;
        *lifecycle = Some(self.spawn_scheduler());
        Ok(snapshot)
    }

    /// Stop the running session and wait for the scheduler to exit.
    ///
    /// Calling it again returns the same terminal snapshot without
    /// publishing anything.
    pub async fn stop(&self) -> Arc<StatusSnapshot> {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            return self.shared.publisher.current();
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("Scheduler task ended abnormally: {e}");
        }
        {
            let mut info = self.shared.info.write().await;
            info.running = false;
            info.current_speaker = None;
        }
        info!("Session stopped");
        self.shared.publish().await
    }

    /// Restart the scheduler on the existing session, keeping history, topic
    /// and agent states.
    pub async fn resume(&self) -> Result<Arc<StatusSnapshot>, SessionError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        {
            let mut info = self.shared.info.write().await;
            if info.session_id.is_none() {
                return Err(SessionError::NoTopic);
            }
            info.running = true;
        }

        info!("Resuming session");
        let snapshot = self.shared.publish().await;
        *lifecycle = Some(self.spawn_scheduler());
        Ok(snapshot)
    }

    fn spawn_scheduler(&self) -> RunningSession {
        let cancel = CancellationToken::new();
        let scheduler = TurnScheduler::new(Arc::clone(&self.shared), cancel.clone());
        RunningSession {
            cancel,
            handle: tokio::spawn(scheduler.run()),
        }
    }

    /// Append an out-of-band message. The next turn's context includes it.
    pub async fn inject_message(
        &self,
        content: impl Into<String>,
        sender: impl Into<String>,
    ) -> Result<Message, SessionError> {
        self.require_session().await?;
        let message = Message::injected(sender, content);
        self.shared.history.append(message.clone()).await;
        info!("Injected message from {}", message.sender);
        self.shared.publish().await;
        Ok(message)
    }

    /// Cancel the turn in progress, if any, and skip the rest of the
    /// inter-turn wait. Returns whether a turn was cancelled.
    ///
    /// Called during a turn, it also skips the wait that follows that turn.
    pub async fn interrupt(&self) -> Result<bool, SessionError> {
        if !self.shared.info.read().await.running {
            return Err(SessionError::NotRunning);
        }
        let cancelled = self
            .shared
            .current_turn
            .lock()
            .await
            .take()
            .is_some_and(|token| {
                token.cancel();
                true
            });
        self.shared.wake.notify_one();
        info!("Interrupt requested (turn cancelled: {cancelled})");
        Ok(cancelled)
    }

    /// Replace the topic. A turn that already read the old topic finishes
    /// with it.
    pub async fn switch_context(
        &self,
        new_topic: impl Into<String>,
    ) -> Result<Arc<StatusSnapshot>, SessionError> {
        let new_topic = new_topic.into();
        {
            let mut info = self.shared.info.write().await;
            if info.session_id.is_none() {
                return Err(SessionError::NotRunning);
            }
            info.topic = Some(new_topic.clone());
        }
        info!("Switched topic to: {new_topic}");
        Ok(self.shared.publish().await)
    }

    /// Change the pace multiplier. Applies from the next inter-turn wait.
    pub async fn set_rate(&self, rate: f64) -> Result<Arc<StatusSnapshot>, SessionError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SessionError::InvalidRate(rate));
        }
        self.shared.info.write().await.rate = rate;
        info!("Rate set to {rate}");
        Ok(self.shared.publish().await)
    }

    pub async fn pause_agent(
        &self,
        name: &str,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        self.transition(name, Transition::Pause, reason).await
    }

    pub async fn resume_agent(
        &self,
        name: &str,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        self.transition(name, Transition::Resume, reason).await
    }

    pub async fn stop_agent(
        &self,
        name: &str,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        self.transition(name, Transition::Stop, reason).await
    }

    pub async fn finish_agent(
        &self,
        name: &str,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        self.transition(name, Transition::Finish, reason).await
    }

    pub async fn restart_agent(
        &self,
        name: &str,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        self.transition(name, Transition::Restart, reason).await
    }

    async fn transition(
        &self,
        name: &str,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        let agent = self
            .shared
            .agent(name)
            .ok_or_else(|| SessionError::UnknownAgent(name.to_string()))?;
        let state = agent.transition(transition, reason).await?;
        self.shared.publish().await;
        Ok(state)
    }

    async fn require_session(&self) -> Result<(), SessionError> {
        if self.shared.info.read().await.session_id.is_none() {
            return Err(SessionError::NotRunning);
        }
        Ok(())
    }

    pub async fn history(&self) -> Vec<Message> {
        self.shared.history.snapshot().await
    }

    #[must_use]
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.shared.publisher.current()
    }

    /// Current snapshot followed by every later one.
    #[must_use]
    pub fn subscribe(&self) -> BoxStream<'static, Arc<StatusSnapshot>> {
        self.shared.publisher.subscribe()
    }

    #[must_use]
    pub fn roster(&self) -> Vec<String> {
        self.shared.participants()
    }

    pub async fn topic(&self) -> Option<String> {
        self.shared.info.read().await.topic.clone()
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.shared.info.read().await.session_id
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.is_some()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(running) = self.lifecycle.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

/// Assembles a [`SessionController`] from a roster and collaborators.
#[derive(Default)]
pub struct SessionControllerBuilder {
    agents: Vec<(AgentProfile, Arc<dyn ChatProvider>)>,
    scheduler: SchedulerConfig,
    history: HistoryConfig,
    retrieval: RetrievalConfig,
    memory: Option<Arc<MemoryGateway>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    tts: Option<Arc<dyn TtsClient>>,
}

impl SessionControllerBuilder {
    /// Add an agent. Roster order is insertion order.
    #[must_use]
    pub fn agent(mut self, profile: AgentProfile, provider: Arc<dyn ChatProvider>) -> Self {
        self.agents.push((profile, provider));
        self
    }

    #[must_use]
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    #[must_use]
    pub fn history_config(mut self, config: HistoryConfig) -> Self {
        self.history = config;
        self
    }

    #[must_use]
    pub fn retrieval_config(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    #[must_use]
    pub fn memory(mut self, memory: Arc<MemoryGateway>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Defaults to [`ExtractiveSummarizer`].
    #[must_use]
    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    #[must_use]
    pub fn tts(mut self, tts: Arc<dyn TtsClient>) -> Self {
        self.tts = Some(tts);
        self
    }

    pub fn build(self) -> Result<SessionController, SessionError> {
        if self.agents.is_empty() {
            return Err(SessionError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for (profile, _) in &self.agents {
            if !seen.insert(profile.name.as_str()) {
                return Err(SessionError::DuplicateAgent(profile.name.clone()));
            }
        }
        if self.history.max_messages < 2 || self.history.keep_recent >= self.history.max_messages {
            return Err(SessionError::InvalidHistoryBudget {
                max_messages: self.history.max_messages,
                keep_recent: self.history.keep_recent,
            });
        }

        let summarizer: Arc<dyn Summarizer> = match self.summarizer {
            Some(summarizer) => summarizer,
            None => Arc::new(ExtractiveSummarizer),
        };
        let mut assembler = ContextAssembler::new(self.history, self.retrieval, summarizer);
        if let Some(memory) = &self.memory {
            assembler = assembler.with_memory(Arc::clone(memory));
        }

        let roster = self
            .agents
            .into_iter()
            .map(|(profile, provider)| Arc::new(AgentRuntime::new(profile, provider)))
            .collect();

        let shared = SessionShared::new(roster, assembler, self.memory, self.tts, self.scheduler);
        Ok(SessionController {
            shared: Arc::new(shared),
            lifecycle: Mutex::new(None),
        })
    }
}
