//! Request plumbing shared by the HTTP providers.

use std::time::Duration;

use reqwest::Client;
use roundtable_core::ProviderError;
use roundtable_core::util::truncate_chars;
use serde_json::Value;

const ERROR_BODY_CHARS: usize = 500;

/// POST `body` as JSON and decode a JSON reply.
///
/// Transport failures map to [`ProviderError::Http`] or
/// [`ProviderError::Timeout`], non-success statuses to
/// [`ProviderError::Status`] and undecodable bodies to
/// [`ProviderError::InvalidResponse`].
pub async fn post_json(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    body: &Value,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let mut request = client.post(url).timeout(timeout).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Http(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, ERROR_BODY_CHARS),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Convert f64 to f32 for embedding values
/// Precision loss is acceptable for ML embeddings
#[expect(clippy::cast_possible_truncation, reason = "ML embeddings use f32")]
const fn f64_to_f32(x: f64) -> f32 {
    x as f32
}

pub fn parse_vector(value: &Value) -> Result<Vec<f32>, ProviderError> {
    value
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("missing embedding".to_string()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(f64_to_f32)
                .ok_or_else(|| ProviderError::InvalidResponse("invalid embedding value".to_string()))
        })
        .collect()
}

pub fn token_count(value: &Value) -> u32 {
    u32::try_from(value.as_u64().unwrap_or(0)).unwrap_or(0)
}

/// Check the backend returned one vector per input.
pub fn expect_count(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(ProviderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )))
    }
}
