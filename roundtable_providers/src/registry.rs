use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use roundtable_config::{Config, ProviderConfig};
use roundtable_core::{
    AgentProfile, ChatMessage, ChatParams, ChatProvider, ChatResponse, EmbeddingProvider,
    ProviderError, ProviderKind,
};
use tracing::debug;

use crate::local::LocalInferenceProvider;
use crate::openai::OpenAiCompatibleProvider;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("custom provider {0} has not been registered; custom providers are only available to programs that call ProviderRegistry::register_custom")]
    UnregisteredCustom(String),
    #[error("provider {0} cannot serve embeddings")]
    EmbeddingsUnsupported(String),
}

/// A resolved chat backend.
#[derive(Clone)]
pub enum AgentProvider {
    OpenAiCompatible(OpenAiCompatibleProvider),
    LocalInference(LocalInferenceProvider),
    Custom(Arc<dyn ChatProvider>),
}

#[async_trait]
impl ChatProvider for AgentProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        match self {
            Self::OpenAiCompatible(provider) => provider.chat(messages, params).await,
            Self::LocalInference(provider) => provider.chat(messages, params).await,
            Self::Custom(provider) => provider.chat(messages, params).await,
        }
    }

    fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAiCompatible(_) => ProviderKind::OpenAiCompatible,
            Self::LocalInference(_) => ProviderKind::LocalInference,
            Self::Custom(_) => ProviderKind::Custom,
        }
    }
}

/// Builds provider clients from configuration. All HTTP clients share one
/// connection pool.
pub struct ProviderRegistry {
    client: Client,
    timeout: Duration,
    custom: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            custom: HashMap::new(),
        }
    }

    /// Make an in-process provider available to `custom` config entries.
    /// The `roundtable` binary registers none, so such entries only resolve
    /// when the crates are embedded as a library.
    pub fn register_custom(&mut self, name: impl Into<String>, provider: Arc<dyn ChatProvider>) {
        self.custom.insert(name.into(), provider);
    }

    pub fn resolve(&self, config: &ProviderConfig) -> Result<AgentProvider, RegistryError> {
        match config {
            ProviderConfig::OpenAiCompatible { base_url, api_key } => Ok(
                AgentProvider::OpenAiCompatible(
                    OpenAiCompatibleProvider::new(base_url.as_str(), api_key.clone())
                        .with_client(self.client.clone())
                        .with_timeout(self.timeout),
                ),
            ),
            ProviderConfig::LocalInference { base_url } => Ok(AgentProvider::LocalInference(
                LocalInferenceProvider::new(base_url.as_str())
                    .with_client(self.client.clone())
                    .with_timeout(self.timeout),
            )),
            ProviderConfig::Custom { name } => self
                .custom
                .get(name)
                .map(|provider| AgentProvider::Custom(Arc::clone(provider)))
                .ok_or_else(|| RegistryError::UnregisteredCustom(name.clone())),
        }
    }

    pub fn chat_provider(&self, config: &Config, name: &str) -> Result<AgentProvider, RegistryError> {
        let entry = config
            .providers
            .get(name)
            .ok_or_else(|| RegistryError::UnknownProvider(name.to_string()))?;
        self.resolve(entry)
    }

    /// Embedding client for the configured `embedding` model, if any.
    pub fn embedding_provider(
        &self,
        config: &Config,
    ) -> Result<Option<Arc<dyn EmbeddingProvider>>, RegistryError> {
        let Some(model) = &config.embedding else {
            return Ok(None);
        };
        let provider: Arc<dyn EmbeddingProvider> =
            match self.chat_provider(config, &model.provider)? {
                AgentProvider::OpenAiCompatible(provider) => {
                    Arc::new(provider.embeddings(model.model.as_str()))
                }
                AgentProvider::LocalInference(provider) => {
                    Arc::new(provider.embeddings(model.model.as_str()))
                }
                AgentProvider::Custom(_) => {
                    return Err(RegistryError::EmbeddingsUnsupported(model.provider.clone()));
                }
            };
        Ok(Some(provider))
    }

    /// Chat backend and model for the configured `summarizer`, if any.
    pub fn summarizer(
        &self,
        config: &Config,
    ) -> Result<Option<(Arc<dyn ChatProvider>, String)>, RegistryError> {
        let Some(model) = &config.summarizer else {
            return Ok(None);
        };
        let provider = self.chat_provider(config, &model.provider)?;
        Ok(Some((Arc::new(provider), model.model.clone())))
    }

    /// Profiles and providers for every configured agent, in roster order.
    /// Agents naming the same provider share one client.
    pub fn roster(
        &self,
        config: &Config,
    ) -> Result<Vec<(AgentProfile, Arc<dyn ChatProvider>)>, RegistryError> {
        let mut resolved: HashMap<&str, Arc<dyn ChatProvider>> = HashMap::new();
        let mut roster = Vec::with_capacity(config.agents.len());

        for agent in &config.agents {
            let provider = if let Some(provider) = resolved.get(agent.provider.as_str()) {
                Arc::clone(provider)
            } else {
                let provider: Arc<dyn ChatProvider> =
                    Arc::new(self.chat_provider(config, &agent.provider)?);
                resolved.insert(agent.provider.as_str(), Arc::clone(&provider));
                provider
            };
            debug!("Agent {} uses provider {}", agent.name, agent.provider);
            roster.push((agent.profile(), provider));
        }

        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_config::{AgentConfig, ModelRef};

    struct Echo;

    #[async_trait]
    impl ChatProvider for Echo {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _params: &ChatParams,
        ) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
                usage: None,
            })
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Custom
        }
    }

    fn agent(name: &str, provider: &str) -> AgentConfig {
        AgentConfig {
            name: name.to_string(),
            personality: format!("{name} personality"),
            provider: provider.to_string(),
            model: "m".to_string(),
            temperature: 0.2,
            max_tokens: 64,
            speak: false,
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.providers.insert(
            "remote".to_string(),
            ProviderConfig::OpenAiCompatible {
                base_url: "http://127.0.0.1:9/v1".to_string(),
                api_key: Some("key".to_string()),
            },
        );
        config.providers.insert(
            "local".to_string(),
            ProviderConfig::LocalInference {
                base_url: "http://127.0.0.1:9".to_string(),
            },
        );
        config.providers.insert(
            "echo".to_string(),
            ProviderConfig::Custom {
                name: "echo".to_string(),
            },
        );
        config.agents = vec![
            agent("A", "remote"),
            agent("B", "local"),
            agent("C", "echo"),
        ];
        config
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_roster_resolves_in_order() {
        let mut registry = ProviderRegistry::new(Duration::from_secs(1));
        registry.register_custom("echo", Arc::new(Echo));

        let roster = registry.roster(&config()).expect("roster");
        let kinds: Vec<_> = roster.iter().map(|(_, p)| p.kind()).collect();
        assert_eq!(
            kinds,
            [
                ProviderKind::OpenAiCompatible,
                ProviderKind::LocalInference,
                ProviderKind::Custom
            ]
        );
        assert_eq!(roster[1].0.name, "B");
        assert_eq!(roster[1].0.params.max_tokens, 64);
    }

    #[test]
    fn test_unregistered_custom_provider() {
        let registry = ProviderRegistry::new(Duration::from_secs(1));
        assert_eq!(
            registry.roster(&config()).err(),
            Some(RegistryError::UnregisteredCustom("echo".to_string()))
        );
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new(Duration::from_secs(1));
        assert!(matches!(
            registry.chat_provider(&config(), "missing"),
            Err(RegistryError::UnknownProvider(name)) if name == "missing"
        ));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_optional_embedding_and_summarizer() {
        let registry = ProviderRegistry::new(Duration::from_secs(1));
        let mut config = config();
        assert!(registry.embedding_provider(&config).expect("none").is_none());
        assert!(registry.summarizer(&config).expect("none").is_none());

        config.embedding = Some(ModelRef {
            provider: "local".to_string(),
            model: "nomic-embed-text".to_string(),
        });
        config.summarizer = Some(ModelRef {
            provider: "remote".to_string(),
            model: "gpt-4o-mini".to_string(),
        });
        assert!(registry.embedding_provider(&config).expect("local").is_some());
        let (provider, model) = registry
            .summarizer(&config)
            .expect("remote")
            .expect("configured");
        assert_eq!(provider.kind(), ProviderKind::OpenAiCompatible);
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn test_custom_embeddings_unsupported() {
        let mut registry = ProviderRegistry::new(Duration::from_secs(1));
        registry.register_custom("echo", Arc::new(Echo));
        let mut config = config();
        config.embedding = Some(ModelRef {
            provider: "echo".to_string(),
            model: "x".to_string(),
        });
        assert!(matches!(
            registry.embedding_provider(&config),
            Err(RegistryError::EmbeddingsUnsupported(_))
        ));
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn test_custom_provider_delegates() {
        let mut registry = ProviderRegistry::new(Duration::from_secs(1));
        registry.register_custom("echo", Arc::new(Echo));
        let provider = registry.chat_provider(&config(), "echo").expect("echo");
        let reply = provider
            .chat(&[ChatMessage::user("ping")], &ChatParams::default())
            .await
            .expect("reply");
        assert_eq!(reply.content, "ping");
    }
}
