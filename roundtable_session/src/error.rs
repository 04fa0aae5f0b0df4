use thiserror::Error;

use crate::agent::AgentState;

/// Errors returned by [`crate::SessionController`] operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyRunning,

    #[error("no session is running")]
    NotRunning,

    #[error("no session has been started yet")]
    NoTopic,

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent {agent} cannot move from {from} to {to}")]
    InvalidTransition {
        agent: String,
        from: AgentState,
        to: AgentState,
    },

    #[error("rate must be a positive finite number, got {0}")]
    InvalidRate(f64),

    #[error("duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("roster is empty")]
    EmptyRoster,

    #[error(
        "history budget needs max_messages >= 2 and keep_recent < max_messages, got {max_messages} and {keep_recent}"
    )]
    InvalidHistoryBudget {
        max_messages: usize,
        keep_recent: usize,
    },
}
