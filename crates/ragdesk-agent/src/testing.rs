//! In-test backends.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::{Embedder, GenerateParams, Provider};
use ragdesk_core::types::{Message, ProviderResponse};

type Script = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Chat backend answering from a closure over the last message's text.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::fallible(move |prompt| Ok(f(prompt)))
    }

    pub fn fallible(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(f),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[Message], _: &GenerateParams) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        (self.script)(prompt).map(ProviderResponse::text)
    }
}

/// Maps every text to the same vector, so retrieval returns everything in
/// scope.
pub struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    fn name(&self) -> &str {
        "constant"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.5]).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagDeskError::Timeout("embedding request timed out".into()))
    }
}
