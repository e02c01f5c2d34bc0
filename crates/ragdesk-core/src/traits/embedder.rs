//! Embedding backend trait.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into vectors. Output order matches input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (the query path).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::RagDeskError::Embedding("empty embedding response".into()))
    }
}
