#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Session lifecycle for round-table discussions.
//!
//! [`SessionController`] starts and stops a session, owns the roster and
//! forwards operator commands to each agent's state machine. While a session
//! runs, a scheduler task gives the floor to Active agents in roster order
//! and every change is published as a [`StatusSnapshot`].

mod agent;
mod controller;
mod error;
mod scheduler;
mod shared;
mod status;

pub use agent::{AgentRuntime, AgentRuntimeState, AgentState, Transition, TurnTicket};
pub use controller::{SessionController, SessionControllerBuilder};
pub use error::SessionError;
pub use scheduler::TurnOutcome;
pub use status::{StatusPublisher, StatusSnapshot};
