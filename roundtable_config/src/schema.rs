use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use roundtable_core::{AgentProfile, ChatParams, HistoryConfig, RetrievalConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_TEMPLATE: &str = r#"{
  "scheduler": {
    "base_delay_ms": 2000,
    "initial_rate": 1.0,
    "idle_poll_ms": 500,
    "provider_timeout_secs": 60,
    "retry_delay_ms": 1000,
    "snapshot_tail": 50
  },
  "history": {
    "max_messages": 20,
    "max_chars": 8000,
    "keep_recent": 5
  },
  "retrieval": {
    "enabled": true,
    "top_k": 5,
    "query_recent_messages": 3,
    "context_target_length": 2000
  },
  "providers": {
    "openai": {
      "type": "openai_compatible",
      "base_url": "https://api.openai.com/v1",
      "api_key": "your-api-key-here"
    },
    "ollama": {
      "type": "local_inference",
      "base_url": "http://localhost:11434"
    }
  },
  "embedding": {
    "provider": "openai",
    "model": "text-embedding-3-small"
  },
  "summarizer": {
    "provider": "openai",
    "model": "gpt-4o-mini"
  },
  "agents": [
    {
      "name": "Ada",
      "personality": "A precise engineer who asks for evidence and likes concrete examples.",
      "provider": "openai",
      "model": "gpt-4o-mini",
      "temperature": 0.7,
      "max_tokens": 400
    },
    {
      "name": "Basil",
      "personality": "A cheerful contrarian who argues the unpopular side of every question.",
      "provider": "ollama",
      "model": "llama3.1",
      "temperature": 0.9,
      "max_tokens": 400
    }
  ]
}"#;

/// Backend a named provider entry points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    /// Any server speaking the `OpenAI` chat completions and embeddings API.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Ollama-style local inference server.
    #[serde(rename = "local_inference")]
    LocalInference { base_url: String },
    /// Provider registered in code under `name`. Only usable when the crates
    /// are embedded as a library; the `roundtable` binary registers none.
    #[serde(rename = "custom")]
    Custom { name: String },
}

/// A model on one of the configured providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub personality: String,
    pub provider: String,
    #[serde(default = "AgentConfig::default_model")]
    pub model: String,
    #[serde(default = "AgentConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "AgentConfig::default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub speak: bool,
}

impl AgentConfig {
    fn default_model() -> String {
        ChatParams::default().model
    }

    fn default_temperature() -> f32 {
        ChatParams::default().temperature
    }

    fn default_max_tokens() -> usize {
        ChatParams::default().max_tokens
    }

    #[must_use]
    pub fn profile(&self) -> AgentProfile {
        AgentProfile::new(&self.name, &self.personality)
            .with_params(ChatParams {
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .with_speech(self.speak)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<ModelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarizer: Option<ModelRef>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("roundtable"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'roundtable init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");
        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add your API key to the \"openai\" provider, or point it at another server");
        println!("   2. Start Ollama locally for the \"ollama\" provider, or remove Basil");
        println!("   3. Run 'roundtable run --topic \"...\"' to start a discussion");
        println!();
        println!("🔧 Configuration options:");
        println!("   - agents: roster in speaking order (name, personality, provider, model)");
        println!("   - scheduler.base_delay_ms: pause between turns at rate 1.0");
        println!("   - history.max_messages / keep_recent: summarization budget");
        println!("   - embedding: omit to run without long-term memory");
        println!();
        Ok(())
    }

    /// Write the starter configuration to `path`. Refuses to overwrite.
    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }
        std::fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }

    #[must_use]
    pub fn template() -> &'static str {
        CONFIG_TEMPLATE
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                anyhow::bail!("Agent names must not be empty");
            }
            if !names.insert(agent.name.as_str()) {
                anyhow::bail!("Duplicate agent name: {}", agent.name);
            }
            if !self.providers.contains_key(&agent.provider) {
                anyhow::bail!(
                    "Agent {} uses unknown provider: {}",
                    agent.name,
                    agent.provider
                );
            }
        }

        for (role, model) in [("embedding", &self.embedding), ("summarizer", &self.summarizer)] {
            let Some(model) = model else {
                continue;
            };
            match self.providers.get(&model.provider) {
                None => anyhow::bail!("The {role} uses unknown provider: {}", model.provider),
                Some(ProviderConfig::Custom { .. }) if role == "embedding" => {
                    anyhow::bail!("Custom providers cannot serve embeddings: {}", model.provider)
                }
                Some(_) => {}
            }
        }

        if self.history.max_messages < 2 {
            anyhow::bail!("history.max_messages must be at least 2");
        }
        if self.history.keep_recent >= self.history.max_messages {
            anyhow::bail!(
                "history.keep_recent ({}) must be smaller than history.max_messages ({})",
                self.history.keep_recent,
                self.history.max_messages
            );
        }
        let rate = self.scheduler.initial_rate;
        if !rate.is_finite() || rate <= 0.0 {
            anyhow::bail!("scheduler.initial_rate must be a positive number, got {rate}");
        }
        Ok(())
    }

    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_template_is_valid() {
        let config = Config::parse(Config::template()).expect("template parses");
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].name, "Ada");
        assert_eq!(
            config.providers.get("ollama"),
            Some(&ProviderConfig::LocalInference {
                base_url: "http://localhost:11434".to_string()
            })
        );
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse(
            r#"{
                "providers": { "local": { "type": "local_inference", "base_url": "http://h:1" } },
                "agents": [ { "name": "solo", "provider": "local" } ]
            }"#,
        )
        .expect("minimal config");

        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert!(config.embedding.is_none());
        let profile = config.agents[0].profile();
        assert_eq!(profile.params, ChatParams::default());
        assert!(!profile.speak);
    }

    #[test]
    fn test_duplicate_agents_rejected() {
        let mut config = Config::default();
        config.providers.insert(
            "p".to_string(),
            ProviderConfig::Custom {
                name: "p".to_string(),
            },
        );
        let agent = AgentConfig {
            name: "twin".to_string(),
            personality: String::new(),
            provider: "p".to_string(),
            model: "m".to_string(),
            temperature: 0.5,
            max_tokens: 10,
            speak: false,
        };
        config.agents = vec![agent.clone(), agent];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = Config::parse(r#"{ "agents": [ { "name": "a", "provider": "nowhere" } ] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_budget_checked() {
        let mut config = Config::default();
        config.history.keep_recent = config.history.max_messages;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_embedding_rejected() {
        let result = Config::parse(
            r#"{
                "providers": { "mine": { "type": "custom", "name": "mine" } },
                "embedding": { "provider": "mine", "model": "x" }
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn test_write_template_refuses_overwrite() {
        let dir = std::env::temp_dir().join(format!("roundtable-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("config.json");
        let _ = std::fs::remove_file(&path);

        Config::write_template(&path).expect("first write");
        assert!(Config::write_template(&path).is_err());
        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.agents.len(), 2);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
