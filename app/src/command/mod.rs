//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own input type, dispatched
//! statically from `main`.

use std::sync::Arc;

use roundtable_config::Config;
use roundtable_conversation::ChatSummarizer;
use roundtable_core::{ChatParams, ChatProvider};
use roundtable_memory::{InMemoryVectorStore, MemoryGateway};
use roundtable_providers::ProviderRegistry;
use roundtable_session::SessionController;
use tracing::info;

mod console;
mod info;
mod init;
mod run;
mod version;

pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use run::{RunInput, RunStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Example
/// ```rust
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         // Command logic here
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Wire providers, memory and summarization from `config` into a controller.
fn build_controller(config: &Config) -> anyhow::Result<SessionController> {
    let registry = ProviderRegistry::new(config.scheduler.provider_timeout());

    let mut builder = SessionController::builder()
        .scheduler_config(config.scheduler.clone())
        .history_config(config.history.clone())
        .retrieval_config(config.retrieval.clone());

    for (profile, provider) in registry.roster(config)? {
        info!("Seating {} ({})", profile.name, provider.kind());
        builder = builder.agent(profile, provider);
    }

    if let Some(embedder) = registry.embedding_provider(config)? {
        info!("Memory feature enabled, using in-process vector store");
        let gateway = MemoryGateway::new(embedder, Arc::new(InMemoryVectorStore::new()));
        builder = builder.memory(Arc::new(gateway));
    }

    if let Some((provider, model)) = registry.summarizer(config)? {
        info!("Summarizing long history with {model}");
        let params = ChatParams {
            model,
            ..ChatParams::default()
        };
        builder = builder.summarizer(Arc::new(ChatSummarizer::new(provider, params)));
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_config::{AgentConfig, ProviderConfig};
    use roundtable_providers::RegistryError;

    #[test]
    fn test_custom_provider_is_rejected_by_binary() {
        let mut config = Config::default();
        config.providers.insert(
            "mine".to_string(),
            ProviderConfig::Custom {
                name: "mine".to_string(),
            },
        );
        config.agents.push(AgentConfig {
            name: "Solo".to_string(),
            personality: String::new(),
            provider: "mine".to_string(),
            model: "m".to_string(),
            temperature: 0.5,
            max_tokens: 16,
            speak: false,
        });

        let Err(error) = build_controller(&config) else {
            panic!("custom providers cannot be resolved without registration");
        };
        assert_eq!(
            error.downcast_ref::<RegistryError>(),
            Some(&RegistryError::UnregisteredCustom("mine".to_string()))
        );
    }
}
