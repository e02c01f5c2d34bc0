//! # RagDesk Providers
//!
//! Backend implementations for RagDesk.
//!
//! All OpenAI-compatible services (OpenAI, Azure, Ollama, llama.cpp, vLLM, ...)
//! are handled by a single `OpenAiCompatibleProvider`, which implements both
//! `Provider` (chat) and `Embedder` (vectors).

pub mod openai_compatible;
pub mod provider_registry;
pub mod retry;

use std::sync::Arc;

use ragdesk_core::config::{NetworkConfig, RagDeskConfig};
use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::{Embedder, Provider};

pub use openai_compatible::OpenAiCompatibleProvider;
pub use retry::RetryPolicy;

fn build(
    provider_name: &str,
    api_key: &str,
    endpoint: &str,
    embedding_model: &str,
    network: &NetworkConfig,
) -> Result<OpenAiCompatibleProvider> {
    match provider_name {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => {
            OpenAiCompatibleProvider::custom(other, api_key, embedding_model, network)
        }
        _ => {
            let registry = provider_registry::get_provider_config(provider_name).ok_or_else(|| {
                RagDeskError::ProviderNotFound(format!(
                    "{provider_name} (expected one of: {})",
                    available_providers().join(", ")
                ))
            })?;
            OpenAiCompatibleProvider::from_registry(
                registry,
                api_key,
                endpoint,
                embedding_model,
                network,
            )
        }
    }
}

/// Create the chat backend from `[llm]`.
pub fn create_provider(config: &RagDeskConfig) -> Result<Arc<dyn Provider>> {
    let llm = &config.llm;
    let provider = build(
        &llm.provider,
        &llm.api_key,
        &llm.endpoint,
        &config.embedding.model,
        &config.network,
    )?;
    tracing::debug!("chat provider: {} ({})", llm.provider, llm.model);
    Ok(Arc::new(provider))
}

/// Create the embedding backend from `[embedding]`.
///
/// An empty embedding API key falls back to the `[llm]` key when both
/// sections point at the same provider.
pub fn create_embedder(config: &RagDeskConfig) -> Result<Arc<dyn Embedder>> {
    let emb = &config.embedding;
    let api_key = if emb.api_key.is_empty() && emb.provider == config.llm.provider {
        config.llm.api_key.as_str()
    } else {
        emb.api_key.as_str()
    };
    let provider = build(&emb.provider, api_key, &emb.endpoint, &emb.model, &config.network)?;
    tracing::debug!("embedding provider: {} ({})", emb.provider, emb.model);
    Ok(Arc::new(provider))
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("custom");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let mut config = RagDeskConfig::default();
        config.llm.provider = "does-not-exist".into();
        assert!(matches!(
            create_provider(&config),
            Err(RagDeskError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_custom_provider() {
        let mut config = RagDeskConfig::default();
        config.embedding.provider = "custom:http://localhost:9999/v1".into();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "custom");
    }

    #[test]
    fn test_unknown_provider_lists_choices() {
        let mut config = RagDeskConfig::default();
        config.embedding.provider = "nope".into();
        let Err(RagDeskError::ProviderNotFound(msg)) = create_embedder(&config) else {
            panic!("expected ProviderNotFound")
        };
        assert!(msg.starts_with("nope "));
        assert!(msg.contains("openai") && msg.contains("custom"));
    }
}
