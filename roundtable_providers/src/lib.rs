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

//! HTTP chat and embedding backends.

mod http;
mod local;
mod openai;
mod registry;

pub use local::{LocalEmbeddings, LocalInferenceProvider};
pub use openai::{OpenAiCompatibleProvider, OpenAiEmbeddings};
pub use registry::{AgentProvider, ProviderRegistry, RegistryError};
