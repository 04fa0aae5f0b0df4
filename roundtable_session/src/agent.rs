//! Per-agent lifecycle state and in-flight turn ownership.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use roundtable_core::{AgentProfile, ChatProvider, ProviderKind};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Active,
    Paused,
    Stopped,
    Finished,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Operator commands that move an agent between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    Resume,
    Stop,
    Finish,
    Restart,
}

impl Transition {
    #[must_use]
    pub const fn target(self) -> AgentState {
        match self {
            Self::Pause => AgentState::Paused,
            Self::Resume | Self::Restart => AgentState::Active,
            Self::Stop => AgentState::Stopped,
            Self::Finish => AgentState::Finished,
        }
    }

    /// Whether this command is allowed from `from`.
    #[must_use]
    pub const fn allowed_from(self, from: AgentState) -> bool {
        use AgentState::{Active, Finished, Paused, Stopped};
        matches!(
            (self, from),
            (Self::Pause, Active)
                | (Self::Resume, Paused)
                | (Self::Stop | Self::Finish, Active | Paused)
                | (Self::Restart, Stopped | Finished)
        )
    }
}

/// Serializable view of one agent, as carried in status snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRuntimeState {
    pub name: String,
    pub state: AgentState,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub provider: ProviderKind,
    pub model: String,
}

#[derive(Debug)]
struct AgentSlot {
    state: AgentState,
    changed_at: DateTime<Utc>,
    reason: Option<String>,
    /// Turn currently owned by this agent, keyed by turn number.
    inflight: Option<(u64, CancellationToken)>,
    next_turn: u64,
}

impl AgentSlot {
    fn cancel_inflight(&mut self) -> bool {
        self.inflight.take().is_some_and(|(_, token)| {
            token.cancel();
            true
        })
    }
}

/// Handle for a turn registered with [`AgentRuntime::begin_turn`].
#[derive(Debug, Clone)]
pub struct TurnTicket {
    pub(crate) id: u64,
    pub token: CancellationToken,
}

/// One roster member: its profile, its resolved provider and its state.
pub struct AgentRuntime {
    profile: AgentProfile,
    provider: Arc<dyn ChatProvider>,
    slot: Mutex<AgentSlot>,
}

impl AgentRuntime {
    #[must_use]
    pub fn new(profile: AgentProfile, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            profile,
            provider,
            slot: Mutex::new(AgentSlot {
                state: AgentState::Active,
                changed_at: Utc::now(),
                reason: None,
                inflight: None,
                next_turn: 0,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    #[must_use]
    pub const fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    pub async fn state(&self) -> AgentState {
        self.slot.lock().await.state
    }

    /// Apply `transition`, cancelling any turn this agent has in flight.
    pub async fn transition(
        &self,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<AgentRuntimeState, SessionError> {
        let mut slot = self.slot.lock().await;
        let from = slot.state;
        let to = transition.target();
        if !transition.allowed_from(from) {
            return Err(SessionError::InvalidTransition {
                agent: self.profile.name.clone(),
                from,
                to,
            });
        }

        slot.state = to;
        slot.changed_at = Utc::now();
        slot.reason = reason;
        if slot.cancel_inflight() {
            debug!("Cancelled in-flight turn of {}", self.profile.name);
        }
        info!("Agent {} moved from {from} to {to}", self.profile.name);
        Ok(self.view_locked(&slot))
    }

    /// Back to Active for a fresh session. Not a transition: allowed from
    /// every state.
    pub async fn reset(&self) {
        let mut slot = self.slot.lock().await;
        slot.cancel_inflight();
        slot.state = AgentState::Active;
        slot.changed_at = Utc::now();
        slot.reason = None;
    }

    /// Register a turn if the agent is Active.
    ///
    /// The returned token is a child of `session`, so stopping the session
    /// cancels it as well as any later transition of this agent.
    pub async fn begin_turn(&self, session: &CancellationToken) -> Option<TurnTicket> {
        let mut slot = self.slot.lock().await;
        if slot.state != AgentState::Active {
            return None;
        }
        slot.next_turn += 1;
        let ticket = TurnTicket {
            id: slot.next_turn,
            token: session.child_token(),
        };
        slot.inflight = Some((ticket.id, ticket.token.clone()));
        drop(slot);
        Some(ticket)
    }

    pub async fn end_turn(&self, ticket: &TurnTicket) {
        let mut slot = self.slot.lock().await;
        if slot.inflight.as_ref().is_some_and(|(id, _)| *id == ticket.id) {
            slot.inflight = None;
        }
    }

    pub async fn view(&self) -> AgentRuntimeState {
        let slot = self.slot.lock().await;
        self.view_locked(&slot)
    }

    fn view_locked(&self, slot: &AgentSlot) -> AgentRuntimeState {
        AgentRuntimeState {
            name: self.profile.name.clone(),
            state: slot.state,
            changed_at: slot.changed_at,
            reason: slot.reason.clone(),
            provider: self.provider.kind(),
            model: self.profile.params.model.clone(),
        }
    }
}
