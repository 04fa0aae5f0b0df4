use std::path::PathBuf;

use roundtable_config::{Config, ModelRef, ProviderConfig};
use roundtable_core::util::truncate_chars;

/// Strategy for displaying configuration information.
///
/// Prints providers (with masked API keys), the roster, pacing and the
/// history and retrieval budgets.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = Option<PathBuf>;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = match &input {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        println!("=== roundtable Configuration ===\n");

        println!("Providers:");
        for (name, provider) in &config.providers {
            match provider {
                ProviderConfig::OpenAiCompatible { base_url, api_key } => {
                    let key = api_key.as_deref().map_or_else(|| "(not set)".to_string(), mask_key);
                    println!("  {name}: OpenAI-compatible at {base_url}, key {key}");
                }
                ProviderConfig::LocalInference { base_url } => {
                    println!("  {name}: local inference at {base_url}");
                }
                ProviderConfig::Custom { name: registered } => {
                    println!("  {name}: custom ({registered})");
                }
            }
        }
        println!();

        println!("Agents:");
        for agent in &config.agents {
            println!(
                "  {} -> {}/{} (temperature {}, max tokens {}{})",
                agent.name,
                agent.provider,
                agent.model,
                agent.temperature,
                agent.max_tokens,
                if agent.speak { ", speaks" } else { "" }
            );
            if !agent.personality.is_empty() {
                println!("    {}", truncate_chars(&agent.personality, 60));
            }
        }
        println!();

        println!("Scheduler:");
        println!("  Base Delay: {} ms", config.scheduler.base_delay_ms);
        println!("  Initial Rate: {}", config.scheduler.initial_rate);
        println!("  Provider Timeout: {} s", config.scheduler.provider_timeout_secs);
        println!();

        println!("History:");
        println!("  Max Messages: {}", config.history.max_messages);
        println!("  Max Chars: {}", config.history.max_chars);
        println!("  Keep Recent: {}", config.history.keep_recent);
        println!("  Summarizer: {}", describe(config.summarizer.as_ref(), "extractive"));
        println!();

        println!("Memory Retrieval:");
        println!("  Embedding: {}", describe(config.embedding.as_ref(), "disabled"));
        println!("  Enabled: {}", config.retrieval.enabled);
        println!("  Top K: {}", config.retrieval.top_k);
        println!(
            "  Context Target Length: {}",
            config.retrieval.context_target_length
        );

        Ok(())
    }
}

fn describe(model: Option<&ModelRef>, fallback: &str) -> String {
    model.map_or_else(
        || fallback.to_string(),
        |model| format!("{}/{}", model.provider, model.model),
    )
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-1234567890abcd"), "sk-1...abcd");
        assert_eq!(mask_key("short"), "***");
    }
}
