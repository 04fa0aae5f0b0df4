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

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for servers implementing the `OpenAI` chat completions and
/// embeddings endpoints.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating OpenAiCompatibleProvider for {base_url}");
        Self {
            client: Client::new(),
            api_key,
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

    /// Embedding client for `model` on the same server.
    #[must_use]
    pub fn embeddings(&self, model: impl Into<String>) -> OpenAiEmbeddings {
        OpenAiEmbeddings {
            provider: self.clone(),
            model: model.into(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        post_json(
            &self.client,
            &format!("{}/{path}", self.base_url),
            self.api_key.as_deref(),
            body,
            self.timeout,
        )
        .await
    }
}

fn parse_chat_completion(response: &Value) -> Result<ChatResponse, ProviderError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse("missing content".to_string()))?
        .to_string();

    let usage = response["usage"].as_object().map(|u| Usage {
        prompt_tokens: token_count(&u["prompt_tokens"]),
        completion_tokens: token_count(&u["completion_tokens"]),
        total_tokens: token_count(&u["total_tokens"]),
    });

    Ok(ChatResponse { content, usage })
}

fn parse_embeddings(response: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = response["data"]
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;

    let mut indexed = data
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let index = item["index"]
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or(position);
            parse_vector(&item["embedding"]).map(|vector| (index, vector))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        let request = json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        debug!("Sending chat request: model={}", params.model);
        let response = self.post("chat/completions", &request).await?;
        parse_chat_completion(&response)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }
}

/// Embeddings endpoint of an [`OpenAiCompatibleProvider`].
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    provider: OpenAiCompatibleProvider,
    model: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = json!({
            "model": self.model,
            "input": texts,
        });
        let response = self.provider.post("embeddings", &request).await?;
        expect_count(parse_embeddings(&response)?, texts.len())
    }
}
