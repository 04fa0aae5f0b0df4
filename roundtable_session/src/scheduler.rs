//! Round-robin turn loop for a running session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use roundtable_conversation::TurnRequest;
use roundtable_core::{
    ChatMessage, ChatResponse, GenerationMeta, Message, ProviderError, RetryError,
    retry_with_backoff,
};
use roundtable_memory::MemoryMetadata;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{AgentRuntime, Transition, TurnTicket};
use crate::shared::SessionShared;

/// How a single turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply was appended to history.
    Completed(Message),
    /// A checkpoint observed cancellation; nothing was applied.
    Cancelled,
    /// The provider failed after its retry; the agent was paused.
    Failed(ProviderError),
}

/// Drives turns until the session token is cancelled.
pub(crate) struct TurnScheduler {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    cursor: usize,
}

impl TurnScheduler {
    pub const fn new(shared: Arc<SessionShared>, cancel: CancellationToken) -> Self {
        Self {
            shared,
            cancel,
            cursor: 0,
        }
    }

    pub async fn run(mut self) {
        info!("Turn scheduler started");

        while !self.cancel.is_cancelled() {
            let Some((agent, ticket)) = self.next_agent().await else {
                debug!("No active agents, idling");
                if !self.wait(self.shared.config.idle_poll()).await {
                    break;
                }
                continue;
            };

            match self.run_turn(&agent, ticket).await {
                TurnOutcome::Completed(message) => {
                    debug!("{} completed a turn ({} chars)", agent.name(), message.content.len());
                }
                TurnOutcome::Cancelled => debug!("Turn of {} was cancelled", agent.name()),
                TurnOutcome::Failed(e) => warn!("Turn of {} failed: {e}", agent.name()),
            }

            let rate = self.shared.info.read().await.rate;
            if !self.wait(self.shared.config.delay_for_rate(rate)).await {
                break;
            }
        }

        info!("Turn scheduler stopped");
    }

    /// Next Active agent at or after the cursor, in roster order, with its
    /// turn already registered. Advances the cursor past it.
    async fn next_agent(&mut self) -> Option<(Arc<AgentRuntime>, TurnTicket)> {
        let len = self.shared.roster.len();
        for offset in 0..len {
            let index = (self.cursor + offset) % len;
            let agent = &self.shared.roster[index];
            if let Some(ticket) = agent.begin_turn(&self.cancel).await {
                self.cursor = (index + 1) % len;
                return Some((Arc::clone(agent), ticket));
            }
        }
        None
    }

    /// Sleep for `delay`. Returns `false` when the session was cancelled.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = self.shared.wake.notified() => true,
            () = sleep(delay) => true,
        }
    }

    async fn run_turn(&self, agent: &AgentRuntime, ticket: TurnTicket) -> TurnOutcome {
        {
            *self.shared.current_turn.lock().await = Some(ticket.token.clone());
            self.shared.info.write().await.current_speaker = Some(agent.name().to_string());
        }
        self.shared.publish().await;

        let outcome = self.execute(agent, &ticket.token).await;

        agent.end_turn(&ticket).await;
        *self.shared.current_turn.lock().await = None;

        match &outcome {
            TurnOutcome::Completed(_) => {
                let mut info = self.shared.info.write().await;
                info.turn_count += 1;
                info.current_speaker = None;
            }
            TurnOutcome::Cancelled => {
                self.shared.info.write().await.current_speaker = None;
            }
            TurnOutcome::Failed(e) => {
                self.shared.info.write().await.current_speaker = None;
                if let Err(transition_error) = agent
                    .transition(Transition::Pause, Some(e.to_string()))
                    .await
                {
                    debug!("Not pausing {} after failure: {transition_error}", agent.name());
                }
            }
        }
        self.shared.publish().await;
        outcome
    }

    async fn execute(&self, agent: &AgentRuntime, cancel: &CancellationToken) -> TurnOutcome {
        let (session_id, topic) = {
            let info = self.shared.info.read().await;
            (info.session_id, info.topic.clone())
        };
        let (Some(session_id), Some(topic)) = (session_id, topic) else {
            return TurnOutcome::Cancelled;
        };

        let participants = self.shared.participants();
        let request = TurnRequest {
            agent: agent.profile(),
            participants: &participants,
            session_id,
            topic: &topic,
        };
        let Ok(prompt) = self
            .shared
            .assembler
            .assemble(&request, &self.shared.history, cancel)
            .await
        else {
            return TurnOutcome::Cancelled;
        };

        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        let started = Instant::now();
        let response = match self.chat(agent, &prompt.messages, cancel).await {
            Ok(response) => response,
            Err(RetryError::Cancelled) => return TurnOutcome::Cancelled,
            Err(RetryError::Exhausted(e)) => return TurnOutcome::Failed(e),
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let content = response.content.trim().to_string();

        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        let audio = match (&self.shared.tts, agent.profile().speak) {
            (Some(tts), true) => tokio::select! {
                biased;
                () = cancel.cancelled() => return TurnOutcome::Cancelled,
                audio = tts.speak(&content) => audio,
            },
            _ => None,
        };

        let message = Message::from_agent(agent.name(), content)
            .with_audio(audio)
            .with_meta(GenerationMeta {
                provider: agent.provider().kind(),
                model: agent.profile().params.model.clone(),
                latency_ms,
                usage: response.usage,
            });

        if !self
            .shared
            .history
            .append_unless_cancelled(message.clone(), cancel)
            .await
        {
            return TurnOutcome::Cancelled;
        }

        self.remember(agent, &message, session_id, &topic, cancel).await;
        TurnOutcome::Completed(message)
    }

    /// Chat call bounded by the provider timeout, retried once.
    async fn chat(
        &self,
        agent: &AgentRuntime,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, RetryError<ProviderError>> {
        let limit = self.shared.config.provider_timeout();
        let provider = agent.provider();
        let params = &agent.profile().params;

        retry_with_backoff(
            || async move {
                let response = timeout(limit, provider.chat(messages, params))
                    .await
                    .map_err(|_| ProviderError::Timeout(limit))??;
                if response.content.trim().is_empty() {
                    return Err(ProviderError::InvalidResponse("empty reply".to_string()));
                }
                Ok::<_, ProviderError>(response)
            },
            &[self.shared.config.retry_delay()],
            cancel,
        )
        .await
    }

    /// Persist a committed turn to the speaker's memory. Failures are logged.
    async fn remember(
        &self,
        agent: &AgentRuntime,
        message: &Message,
        session_id: Uuid,
        topic: &str,
        cancel: &CancellationToken,
    ) {
        let Some(memory) = &self.shared.memory else {
            return;
        };
        let metadata = MemoryMetadata::new(message.sender.clone()).with_topic(topic);
        tokio::select! {
            biased;
            () = cancel.cancelled() => debug!("Skipped memory write for cancelled turn of {}", agent.name()),
            result = memory.add(&message.content, session_id, agent.name(), metadata) => {
                if let Err(e) = result {
                    warn!("Failed to store memory for {}: {e}", agent.name());
                }
            }
        }
    }
}
