#![warn(
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

//! Turn context for multi-agent discussions.
//!
//! This crate owns the shared message history of a session and turns it,
//! together with retrieved memories and the topic, into the prompt for the
//! next speaker.
//!
//! # Key Features
//! - Sliding history window bounded by message count and characters
//! - Summarization of the oldest history once the budget is exceeded
//! - Session-scoped memory retrieval with agent-wide fallback

mod assembler;
mod history;
mod summarizer;

pub use assembler::{ContextAssembler, TurnPrompt, TurnRequest};
pub use history::{History, HistoryStats, HistoryWindow, summarization_cut};
pub use summarizer::{ChatSummarizer, ExtractiveSummarizer};
