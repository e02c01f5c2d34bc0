//! Access-filtered similarity retrieval.

use std::sync::Arc;

use ragdesk_core::access::AccessScope;
use ragdesk_core::error::Result;
use ragdesk_core::traits::Embedder;
use serde::Serialize;

use crate::store::{ScoredRecord, VectorStore};

/// A chunk returned for a query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub department: String,
    pub source: String,
    pub score: f64,
}

impl From<ScoredRecord> for RetrievedChunk {
    fn from(r: ScoredRecord) -> Self {
        Self {
            id: r.id,
            text: r.text,
            department: r.department,
            source: r.source,
            score: r.score,
        }
    }
}

pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { store, embedder, top_k }
    }

    /// Top-k chunks for `query` within `scope`, best first.
    ///
    /// A department scope only ever sees records tagged with that
    /// department. An empty result is not an error.
    pub async fn retrieve(&self, query: &str, scope: &AccessScope) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed_one(query).await?;
        let hits = self.store.search(&embedding, scope.department(), self.top_k)?;
        tracing::debug!("🔎 {} chunks retrieved for scope '{scope}'", hits.len());
        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}
