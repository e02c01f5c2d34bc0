//! Unified OpenAI-compatible backend.
//!
//! A single struct serves both chat completions and embeddings for every
//! OpenAI-compatible API. Providers differ only by endpoint URL, auth style
//! and API key. Each request runs under the configured timeout and retry
//! budget.

use std::time::Duration;

use async_trait::async_trait;
use ragdesk_core::config::NetworkConfig;
use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::{Embedder, GenerateParams, Provider};
use ragdesk_core::types::{Message, ProviderResponse, Usage};
use serde_json::{Value, json};

use crate::provider_registry::{AuthStyle, CHAT_PATH, ProviderConfig};
use crate::retry::RetryPolicy;

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    /// No trailing slash, e.g. `https://api.openai.com/v1`.
    base_url: String,
    embeddings_path: Option<&'static str>,
    auth_style: AuthStyle,
    /// Model used for embedding requests. Chat requests carry their own.
    embedding_model: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

/// Explicit key first, then the backend's env vars.
fn resolve_api_key(explicit: &str, env_keys: &[&str]) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    env_keys
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .unwrap_or_default()
}

/// Explicit endpoint first, then the env override, then the built-in default.
fn resolve_base_url(explicit: &str, backend: &ProviderConfig) -> String {
    if !explicit.is_empty() {
        return explicit.trim_end_matches('/').to_string();
    }
    match backend.base_url_env.and_then(|var| std::env::var(var).ok()) {
        // Host variables such as OLLAMA_HOST omit the /v1 suffix.
        Some(host) if host.ends_with("/v1") => host,
        Some(host) => format!("{}/v1", host.trim_end_matches('/')),
        None => backend.base_url.to_string(),
    }
}

impl OpenAiCompatibleProvider {
    pub fn from_registry(
        backend: &ProviderConfig,
        api_key: &str,
        endpoint: &str,
        embedding_model: &str,
        network: &NetworkConfig,
    ) -> Result<Self> {
        let base_url = resolve_base_url(endpoint, backend);
        if base_url.is_empty() {
            return Err(RagDeskError::Config(format!(
                "provider '{}' needs an explicit endpoint",
                backend.name
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network.timeout_secs))
            .build()
            .map_err(|e| RagDeskError::Http(format!("client build failed: {e}")))?;

        Ok(Self {
            name: backend.name.to_string(),
            api_key: resolve_api_key(api_key, backend.env_keys),
            base_url,
            embeddings_path: backend.embeddings_path(),
            auth_style: backend.auth_style,
            embedding_model: embedding_model.to_string(),
            retry: RetryPolicy::from_config(network),
            client,
        })
    }

    /// Backend at `custom:<url>`. Auth is sent only when a key is available.
    pub fn custom(
        endpoint: &str,
        api_key: &str,
        embedding_model: &str,
        network: &NetworkConfig,
    ) -> Result<Self> {
        let base_url = endpoint.strip_prefix("custom:").unwrap_or(endpoint);
        let api_key = resolve_api_key(api_key, &["CUSTOM_API_KEY"]);
        let backend = ProviderConfig {
            name: "custom",
            base_url: "",
            embeddings: true,
            env_keys: &[],
            auth_style: if api_key.is_empty() {
                AuthStyle::None
            } else {
                AuthStyle::Bearer
            },
            base_url_env: None,
        };
        Self::from_registry(&backend, &api_key, base_url, embedding_model, network)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(RagDeskError::ApiKeyMissing(self.name.clone()));
        }
        Ok(())
    }

    /// POST a JSON body once and return the parsed JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                RagDeskError::Timeout(format!("{} request to {url} timed out", self.name))
            } else {
                RagDeskError::Http(format!("{} connection failed ({url}): {e}", self.name))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RagDeskError::Provider {
                status: status.as_u16(),
                message: format!("{} API error: {text}", self.name),
            });
        }

        resp.json()
            .await
            .map_err(|e| RagDeskError::Http(format!("{} returned invalid JSON: {e}", self.name)))
    }
}

/// Parse a chat completion body in OpenAI format.
pub(crate) fn parse_chat_response(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| RagDeskError::Other("No choices in response".into()))?;

    let content = choice["message"]["content"].as_str().map(String::from);

    let usage = json["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ProviderResponse {
        content,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}

/// Parse an embeddings body, restoring input order from `index`.
pub(crate) fn parse_embedding_response(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| RagDeskError::Embedding("missing 'data' array".into()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let idx = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
            let vector = item["embedding"]
                .as_array()
                .map(|values| values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
                .unwrap_or_default();
            (idx, vector)
        })
        .collect();
    indexed.sort_by_key(|(idx, _)| *idx);

    if indexed.len() != expected {
        return Err(RagDeskError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            indexed.len()
        )));
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        self.require_key()?;

        let body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "messages": messages,
        });

        let label = format!("{} chat", self.name);
        let json = self
            .retry
            .run(&label, || self.post_json(CHAT_PATH, &body))
            .await?;
        parse_chat_response(&json)
    }

    async fn health_check(&self) -> Result<bool> {
        if self.auth_style != AuthStyle::None {
            return Ok(!self.api_key.is_empty());
        }
        let resp = self.client.get(format!("{}/models", self.base_url)).send().await;
        Ok(resp.is_ok())
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.require_key()?;
        let path = self.embeddings_path.ok_or_else(|| {
            RagDeskError::Embedding(format!("provider '{}' has no embeddings endpoint", self.name))
        })?;

        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });

        let label = format!("{} embeddings", self.name);
        let json = self.retry.run(&label, || self.post_json(path, &body)).await?;
        parse_embedding_response(&json, texts.len())
    }
}
