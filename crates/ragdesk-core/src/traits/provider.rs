//! Language-generation backend trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, ProviderResponse};

/// Sampling parameters for one generation request.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// A chat-completion backend. Stateless: every call carries its full context.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], params: &GenerateParams)
    -> Result<ProviderResponse>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
