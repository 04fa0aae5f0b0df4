use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use roundtable_core::{
    ChatMessage, ChatParams, ChatProvider, ChatResponse, EmbeddingProvider, ProviderError,
    ProviderKind, Usage,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::http::{expect_count, parse_vector, post_json, token_count};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for an Ollama-style local inference server.
#[derive(Clone)]
pub struct LocalInferenceProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl LocalInferenceProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating LocalInferenceProvider for {base_url}");
        Self {
            client: Client::new(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn embeddings(&self, model: impl Into<String>) -> LocalEmbeddings {
        LocalEmbeddings {
            provider: self.clone(),
            model: model.into(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        post_json(
            &self.client,
            &format!("{}/{path}", self.base_url),
            None,
            body,
            self.timeout,
        )
        .await
    }
}

fn parse_chat(response: &Value) -> Result<ChatResponse, ProviderError> {
    let content = response["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse("missing message content".to_string()))?
        .to_string();

    // Servers omit the counters when the prompt was cached
    let usage = (response.get("prompt_eval_count").is_some() || response.get("eval_count").is_some())
        .then(|| {
            let prompt_tokens = token_count(&response["prompt_eval_count"]);
            let completion_tokens = token_count(&response["eval_count"]);
            Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            }
        });

    Ok(ChatResponse { content, usage })
}

#[async_trait]
impl ChatProvider for LocalInferenceProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        let request = json!({
            "model": params.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        });

        debug!("Sending local chat request: model={}", params.model);
        let response = self.post("api/chat", &request).await?;
        parse_chat(&response)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalInference
    }
}

#[derive(Clone)]
pub struct LocalEmbeddings {
    provider: LocalInferenceProvider,
    model: String,
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = json!({
            "model": self.model,
            "input": texts,
        });
        let response = self.provider.post("api/embed", &request).await?;

        let vectors = response["embeddings"]
            .as_array()
            .ok_or_else(|| ProviderError::InvalidResponse("missing embeddings".to_string()))?
            .iter()
            .map(parse_vector)
            .collect::<Result<Vec<_>, _>>()?;
        expect_count(vectors, texts.len())
    }
}
