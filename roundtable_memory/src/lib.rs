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
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

//! Per-agent long-term semantic memory.
//!
//! Entries are scoped by agent and session. The [`MemoryGateway`] embeds
//! text through an [`EmbeddingProvider`](roundtable_core::EmbeddingProvider)
//! and delegates storage and nearest-neighbour search to a [`VectorStore`].

mod entry;
mod gateway;
mod scoring;
mod store;

pub use entry::{MemoryEntry, MemoryFilter, MemoryMetadata, ScoredMemory};
pub use gateway::MemoryGateway;
pub use scoring::cosine_similarity;
pub use store::{InMemoryVectorStore, VectorStore};

use roundtable_core::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory unavailable: {0}")]
    Unavailable(String),

    #[error("embedding provider error: {0}")]
    Embedding(#[from] ProviderError),

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },
}
