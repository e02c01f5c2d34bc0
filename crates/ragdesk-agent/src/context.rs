//! Service context: everything a running RagDesk process shares.
//!
//! Built once at startup. The dataset registry is loaded here and handed to
//! the router explicitly; it is never reloaded for the process lifetime.

use std::path::PathBuf;
use std::sync::Arc;

use ragdesk_core::access::UserDirectory;
use ragdesk_core::config::{LlmConfig, RagDeskConfig, expand_path};
use ragdesk_core::error::Result;
use ragdesk_core::traits::{Embedder, GenerateParams, Provider};
use ragdesk_knowledge::{Indexer, Retriever, VectorStore};
use ragdesk_tabular::{DatasetRegistry, TabularEngine};

use crate::router::QueryRouter;
use crate::synthesizer::Synthesizer;

pub struct ServiceContext {
    pub config: RagDeskConfig,
    pub store: Arc<VectorStore>,
    pub datasets: Arc<DatasetRegistry>,
    pub indexer: Arc<Indexer>,
    pub router: Arc<QueryRouter>,
    pub users: Arc<UserDirectory>,
}

/// Generation parameters from `[llm]`.
pub fn generate_params(llm: &LlmConfig) -> GenerateParams {
    GenerateParams {
        model: llm.model.clone(),
        temperature: llm.temperature,
        max_tokens: llm.max_tokens,
    }
}

impl ServiceContext {
    /// Connect backends, open the vector store and load datasets.
    pub fn build(config: RagDeskConfig) -> Result<Self> {
        let provider = ragdesk_providers::create_provider(&config)?;
        let embedder = ragdesk_providers::create_embedder(&config)?;

        let db_path = expand_path(&config.index.db_path);
        let store = Arc::new(VectorStore::open(&db_path, &config.index.collection)?);
        tracing::info!(
            "📚 Vector store {} ('{}'): {} records",
            db_path.display(),
            config.index.collection,
            store.count()?
        );

        let datasets = Arc::new(DatasetRegistry::load(&expand_path(&config.tabular.data_dir)));
        Ok(Self::from_parts(config, provider, embedder, store, datasets))
    }

    /// Assemble from already-constructed parts.
    pub fn from_parts(
        config: RagDeskConfig,
        provider: Arc<dyn Provider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        datasets: Arc<DatasetRegistry>,
    ) -> Self {
        let params = generate_params(&config.llm);

        let indexer = Arc::new(Indexer::new(
            store.clone(),
            embedder.clone(),
            &config.index,
            config.embedding.batch_size,
            &config.access.fallback_department,
        ));
        let retriever = Retriever::new(store.clone(), embedder, config.index.top_k);
        let tabular = TabularEngine::new(
            datasets.clone(),
            provider.clone(),
            params.clone(),
            &config.tabular,
        );
        let synthesizer = Arc::new(Synthesizer::new(provider, params));
        let router = Arc::new(QueryRouter::new(
            retriever,
            tabular,
            synthesizer,
            &config.access.privileged_role,
        ));
        let users = Arc::new(UserDirectory::new(&config.access));

        Self {
            config,
            store,
            datasets,
            indexer,
            router,
            users,
        }
    }

    /// Root scanned by a full re-index.
    pub fn docs_dir(&self) -> PathBuf {
        expand_path(&self.config.index.docs_dir)
    }
}
