//! Query routing.
//!
//! ```text
//! VECTOR_SEARCH ──hits──▶ VECTOR_ANSWER ──found──▶ answer + Sources
//!      │ empty / error          │ sentinel / error
//!      ▼                        ▼
//! TABULAR_SEARCH ──answers──▶ TABULAR_ANSWER ──▶ rewritten answer(s)
//!      │ none
//!      ▼
//! NOT_FOUND
//! ```

use std::sync::Arc;

use ragdesk_core::access::AccessScope;
use ragdesk_core::error::Result;
use ragdesk_knowledge::{RetrievedChunk, Retriever};
use ragdesk_tabular::{TabularEngine, TabularOutcome};
use serde::Serialize;

use crate::synthesizer::{Synthesis, Synthesizer, capitalize};

/// Reply when neither stage produced an answer.
pub const NOT_FOUND_MESSAGE: &str =
    "I'm sorry, I couldn't find relevant information based on your access level and the available data.";

/// How a query was resolved. Exactly one per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Vector { answer: String, sources: Vec<String> },
    Tabular { answer: String },
    NotFound,
}

impl RouteOutcome {
    /// The user-visible reply.
    pub fn render(&self) -> String {
        match self {
            Self::Vector { answer, sources } => format!("{answer}{}", format_citations(sources)),
            Self::Tabular { answer } => answer.clone(),
            Self::NotFound => NOT_FOUND_MESSAGE.to_string(),
        }
    }
}

/// `Sources:` footer. Empty when there are no sources.
pub fn format_citations(sources: &[String]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nSources:\n");
    for source in sources {
        out.push_str(&format!("- {source}\n"));
    }
    out
}

/// Source filenames in first-seen order, without repeats.
pub fn unique_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for chunk in chunks {
        if !seen.contains(&chunk.source) {
            seen.push(chunk.source.clone());
        }
    }
    seen
}

pub struct QueryRouter {
    retriever: Retriever,
    tabular: TabularEngine,
    synthesizer: Arc<Synthesizer>,
    privileged_role: String,
}

impl QueryRouter {
    pub fn new(
        retriever: Retriever,
        tabular: TabularEngine,
        synthesizer: Arc<Synthesizer>,
        privileged_role: &str,
    ) -> Self {
        Self {
            retriever,
            tabular,
            synthesizer,
            privileged_role: privileged_role.to_string(),
        }
    }

    /// Answer a query for a role. Never fails; see [`QueryRouter::resolve`].
    pub async fn answer(&self, query: &str, role: &str) -> String {
        self.resolve(query, role).await.render()
    }

    /// Run the fallback chain and report which stage answered.
    pub async fn resolve(&self, query: &str, role: &str) -> RouteOutcome {
        let scope = AccessScope::from_role(role, &self.privileged_role);
        tracing::info!("🔍 New query for '{scope}': {query}");

        match self.vector_stage(query, &scope).await {
            Ok(Some((answer, sources))) => {
                tracing::info!("✅ Answered from documents ({} sources)", sources.len());
                return RouteOutcome::Vector { answer, sources };
            }
            Ok(None) => tracing::info!("📊 Falling back to tabular data"),
            Err(e) => tracing::warn!("⚠️ Document stage failed, falling back to tabular data: {e}"),
        }

        if let Some(answer) = self.tabular_stage(query, &scope).await {
            tracing::info!("✅ Answered from tabular data");
            return RouteOutcome::Tabular { answer };
        }

        tracing::info!("❌ No answer in documents or tabular data");
        RouteOutcome::NotFound
    }

    async fn vector_stage(
        &self,
        query: &str,
        scope: &AccessScope,
    ) -> Result<Option<(String, Vec<String>)>> {
        let chunks = self.retriever.retrieve(query, scope).await?;
        if chunks.is_empty() {
            tracing::info!("📚 No document chunks in scope");
            return Ok(None);
        }
        tracing::info!("📚 {} document chunks retrieved", chunks.len());

        match self.synthesizer.answer_from_context(query, &chunks).await? {
            Synthesis::Found(answer) => Ok(Some((answer, unique_sources(&chunks)))),
            Synthesis::NotFound => {
                tracing::info!("📚 Documents do not contain the answer");
                Ok(None)
            }
        }
    }

    async fn tabular_stage(&self, query: &str, scope: &AccessScope) -> Option<String> {
        let answers = match self.tabular.query(query, scope).await {
            TabularOutcome::NoDataset => return None,
            TabularOutcome::Answers(answers) => answers,
        };

        if !scope.is_privileged() {
            // Single department: the first useful answer, rewritten.
            let answer = answers.into_iter().next()?;
            let raw = match answer.raw {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("❌ {} dataset failed: {e}", answer.department);
                    return None;
                }
            };
            return match self.synthesizer.rewrite_tabular(query, &answer.department, &raw).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("❌ Rewrite failed for {}: {e}", answer.department);
                    None
                }
            };
        }

        let mut sections = Vec::with_capacity(answers.len());
        for answer in answers {
            let dept = answer.department;
            let rewritten = match answer.raw {
                Ok(raw) => self
                    .synthesizer
                    .rewrite_tabular(query, &dept, &raw)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            sections.push(match rewritten {
                Ok(text) => format!("---\n📊 Data from {} Department:\n{text}", capitalize(&dept)),
                Err(e) => format!("❌ Error querying {dept} data: {e}"),
            });
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesizer::NOT_FOUND_SENTINEL;
    use crate::testing::{ConstantEmbedder, FailingEmbedder, ScriptedProvider};
    use ragdesk_core::config::TabularConfig;
    use ragdesk_core::error::RagDeskError;
    use ragdesk_core::traits::{Embedder, GenerateParams, Provider};
    use ragdesk_knowledge::VectorStore;
    use ragdesk_knowledge::store::NewRecord;
    use ragdesk_tabular::{Dataset, DatasetRegistry};

    fn store_with(docs: &[(&str, &str, &str)]) -> Arc<VectorStore> {
        let store = Arc::new(VectorStore::open_in_memory("company_docs").unwrap());
        let records: Vec<_> = docs
            .iter()
            .map(|(text, dept, source)| NewRecord {
                text: text.to_string(),
                department: dept.to_string(),
                source: source.to_string(),
                embedding: vec![1.0, 0.5],
            })
            .collect();
        store.add(&records).unwrap();
        store
    }

    fn datasets() -> Arc<DatasetRegistry> {
        let mut registry = DatasetRegistry::new();
        registry.insert(
            Dataset::from_reader(
                "engineering",
                "staff.csv",
                "engineer,projects,email\nAlice,3,alice@corp.com\nBob,1,bob@corp.com\n".as_bytes(),
            )
            .unwrap(),
        );
        registry.insert(
            Dataset::from_reader("finance", "q.csv", "quarter,revenue\nQ1,5000000\n".as_bytes()).unwrap(),
        );
        Arc::new(registry)
    }

    /// Backend standing in for the three prompt kinds.
    fn company_model(prompt: &str) -> Result<String> {
        if prompt.contains("Table schema:") {
            if prompt.contains("\"engineer\"") {
                return Ok("SELECT engineer, projects, email FROM data ORDER BY projects DESC LIMIT 1".into());
            }
            return Err(RagDeskError::Provider { status: 400, message: "bad request".into() });
        }
        if prompt.contains("Raw tabular answer:") {
            return Ok("Alice leads the most projects, with three in progress.".into());
        }
        if prompt.contains("Revenue Q1 was $5M") && prompt.contains("revenue") {
            return Ok("Revenue in Q1 was $5M.".into());
        }
        Ok(NOT_FOUND_SENTINEL.into())
    }

    fn router_with(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        provider: Arc<dyn Provider>,
    ) -> QueryRouter {
        let retriever = Retriever::new(store, embedder, 10);
        let tabular = TabularEngine::new(
            datasets(),
            provider.clone(),
            GenerateParams::default(),
            &TabularConfig::default(),
        );
        let synthesizer = Arc::new(Synthesizer::new(provider, GenerateParams::default()));
        QueryRouter::new(retriever, tabular, synthesizer, "c-level")
    }

    fn company_router() -> QueryRouter {
        let store = store_with(&[
            ("Revenue Q1 was $5M", "finance", "report.md"),
            ("Revenue Q1 was $5M across all regions", "finance", "report.md"),
            ("Revenue targets are tracked monthly", "finance", "targets.md"),
            ("Deployments happen every Tuesday", "engineering", "runbook.md"),
        ]);
        router_with(
            store,
            Arc::new(ConstantEmbedder),
            Arc::new(ScriptedProvider::fallible(company_model)),
        )
    }

    #[tokio::test]
    async fn test_finance_answer_with_citations() {
        let router = company_router();
        let reply = router.answer("What was revenue in Q1?", "Finance").await;
        assert!(reply.contains("$5M"));
        assert!(reply.ends_with("\n\nSources:\n- report.md\n- targets.md\n"));
        assert_eq!(reply.matches("report.md").count(), 1);
    }

    #[tokio::test]
    async fn test_hr_without_data_is_not_found() {
        let router = company_router();
        let reply = router.answer("What was revenue in Q1?", "hr").await;
        assert_eq!(reply, NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_engineering_falls_back_to_tabular() {
        let router = company_router();
        let outcome = router.resolve("Who leads the most projects?", "engineering").await;
        assert_eq!(
            outcome,
            RouteOutcome::Tabular {
                answer: "Alice leads the most projects, with three in progress.".into()
            }
        );
        assert!(!outcome.render().contains("Sources:"));
    }

    #[tokio::test]
    async fn test_vector_error_falls_through() {
        let store = store_with(&[("Revenue Q1 was $5M", "finance", "report.md")]);
        let router = router_with(
            store,
            Arc::new(FailingEmbedder),
            Arc::new(ScriptedProvider::fallible(company_model)),
        );
        let outcome = router.resolve("Who leads the most projects?", "engineering").await;
        assert!(matches!(outcome, RouteOutcome::Tabular { .. }));
    }

    #[tokio::test]
    async fn test_blank_document_answer_falls_through() {
        let store = store_with(&[("Deployments happen every Tuesday", "engineering", "runbook.md")]);
        let provider = ScriptedProvider::fallible(|prompt| {
            if prompt.contains("Context:") {
                Ok("   ".into())
            } else {
                company_model(prompt)
            }
        });
        let router = router_with(store, Arc::new(ConstantEmbedder), Arc::new(provider));
        let outcome = router.resolve("Who leads the most projects?", "engineering").await;
        assert!(matches!(outcome, RouteOutcome::Tabular { .. }), "{outcome:?}");
    }

    #[tokio::test]
    async fn test_privileged_fan_out_isolates_failures() {
        let router = company_router();
        // Documents never contain this; every dataset is queried.
        let reply = router.answer("Who leads the most projects?", "C-Level").await;
        let sections: Vec<_> = reply.split("\n\n").collect();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].starts_with("---\n📊 Data from Engineering Department:\n"));
        assert!(sections[0].contains("Alice leads the most projects"));
        assert!(sections[1].starts_with("❌ Error querying finance data:"));
    }

    #[tokio::test]
    async fn test_privileged_sees_all_documents() {
        let router = company_router();
        let outcome = router.resolve("What was revenue in Q1?", "c-level").await;
        let RouteOutcome::Vector { sources, .. } = outcome else { panic!("expected vector answer") };
        assert_eq!(sources, vec!["report.md", "targets.md", "runbook.md"]);
    }

    #[tokio::test]
    async fn test_refusing_backend_is_not_found() {
        let store = store_with(&[("Office hours are 9 to 5", "engineering", "hours.md")]);
        let provider = Arc::new(ScriptedProvider::new(|prompt| {
            if prompt.contains("Table schema:") {
                "I don't know".into()
            } else {
                format!("\"{NOT_FOUND_SENTINEL}\"")
            }
        }));
        let router = router_with(store, Arc::new(ConstantEmbedder), provider.clone());
        let outcome = router.resolve("Who is the CEO?", "engineering").await;
        assert_eq!(outcome, RouteOutcome::NotFound);
        // Mode A, then one SQL attempt; no rewrite for a refusal.
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_outcomes_partition() {
        let router = company_router();
        let cases = [
            ("What was revenue in Q1?", "finance"),
            ("What was revenue in Q1?", "hr"),
            ("Who leads the most projects?", "engineering"),
            ("Who leads the most projects?", "c-level"),
            ("Anything at all?", "marketing"),
        ];
        for (query, role) in cases {
            let outcome = router.resolve(query, role).await;
            let reply = outcome.render();
            match outcome {
                RouteOutcome::NotFound => assert_eq!(reply, NOT_FOUND_MESSAGE),
                RouteOutcome::Vector { .. } => assert!(reply.contains("Sources:")),
                RouteOutcome::Tabular { .. } => {
                    assert_ne!(reply, NOT_FOUND_MESSAGE);
                    assert!(!reply.contains("Sources:"));
                }
            }
        }
    }

    #[test]
    fn test_format_citations() {
        assert_eq!(format_citations(&[]), "");
        assert_eq!(
            format_citations(&["a.md".into(), "b.md".into()]),
            "\n\nSources:\n- a.md\n- b.md\n"
        );
    }
}
