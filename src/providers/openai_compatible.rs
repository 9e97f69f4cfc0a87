use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::providers::ProviderError;
use crate::traits::{EmbeddingProvider, ModelProvider, ProviderResponse, ToolCall};

/// Per-request timeout for completion and embedding calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Drop for OpenAiCompatibleProvider {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

/// Validate the base URL for security.
/// - HTTPS is required for remote URLs to protect API keys in transit
/// - HTTP is allowed only for localhost/127.0.0.1 (local LLM servers)
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", base_url, e))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    match scheme {
        "https" => Ok(()),
        "http" => {
            let is_localhost =
                host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1";

            if is_localhost {
                warn!(
                    "Using unencrypted HTTP for local LLM server at '{}'. \
                     API key will be transmitted in cleartext.",
                    base_url
                );
                Ok(())
            } else {
                Err(format!(
                    "HTTP is not allowed for remote URLs (base_url: '{}'). \
                     Use HTTPS to protect your API key in transit. \
                     HTTP is only permitted for localhost.",
                    base_url
                ))
            }
        }
        _ => Err(format!(
            "Unsupported URL scheme '{}' in base_url '{}'. Only http and https are allowed.",
            scheme, base_url
        )),
    }
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, String> {
        validate_base_url(base_url)?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// POST a JSON body and return the raw response text, classifying
    /// transport and status failures into `ProviderError`.
    async fn post(&self, url: &str, body: &Value) -> anyhow::Result<String> {
        let resp = match self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("HTTP request failed: {}", e);
                return Err(ProviderError::network(&e).into());
            }
        };

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!(status = %status, "Provider API error: {}", text);
            return Err(ProviderError::from_status(status.as_u16(), &text).into());
        }

        // Safely truncate for debug logging, respecting UTF-8 char boundaries
        let truncated = if text.len() > 2000 {
            let mut end = 2000;
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            &text[..end]
        } else {
            &text
        };
        debug!("Provider response: {}", truncated);

        Ok(text)
    }
}

/// Parse a chat-completions response body into a `ProviderResponse`.
fn parse_chat_response(text: &str) -> anyhow::Result<ProviderResponse> {
    let data: Value = serde_json::from_str(text)?;
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| anyhow::anyhow!("No choices in response"))?;
    let message = &choice["message"];

    let content = message["content"].as_str().map(|s| s.to_string());

    let mut tool_calls = Vec::new();
    if let Some(tcs) = message["tool_calls"].as_array() {
        for tc in tcs {
            tool_calls.push(ToolCall {
                id: tc["id"].as_str().unwrap_or("").to_string(),
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                arguments: tc["function"]["arguments"]
                    .as_str()
                    .unwrap_or("{}")
                    .to_string(),
            });
        }
    }

    Ok(ProviderResponse {
        content,
        tool_calls,
    })
}

/// Parse an embeddings response body into vectors, ordered by index.
fn parse_embeddings_response(text: &str, expected: usize) -> anyhow::Result<Vec<Vec<f32>>> {
    let data: Value = serde_json::from_str(text)?;
    let items = data["data"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("No data array in embeddings response"))?;

    let mut vectors: Vec<(usize, Vec<f32>)> = Vec::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
        let vec = item["embedding"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Missing embedding array at index {}", index))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        vectors.push((index, vec));
    }
    vectors.sort_by_key(|(index, _)| *index);

    if vectors.len() != expected {
        anyhow::bail!(
            "Embeddings response returned {} vectors for {} inputs",
            vectors.len(),
            expected
        );
    }

    Ok(vectors.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse> {
        let mut body = json!({
            "model": model,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let url = format!("{}/chat/completions", self.base_url);
        info!(model, url = %url, tools = tools.len(), "Calling LLM API");

        let text = self.post(&url, &body).await?;
        parse_chat_response(&text)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, model: &str, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(model, &[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embeddings response"))
    }

    async fn embed_batch(&self, model: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": model,
            "input": texts,
        });

        let url = format!("{}/embeddings", self.base_url);
        debug!(model, count = texts.len(), "Embedding texts");

        let text = self.post(&url, &body).await?;
        parse_embeddings_response(&text, texts.len())
    }
}
