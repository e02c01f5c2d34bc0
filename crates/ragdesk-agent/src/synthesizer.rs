//! Answer synthesis.
//!
//! Two stateless modes against the generation backend:
//! - grounded answering over retrieved chunks, with a sentinel for "the
//!   context does not say"
//! - rewriting a raw tabular answer into a short professional paragraph

use std::sync::Arc;

use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::{GenerateParams, Provider};
use ragdesk_core::types::Message;
use ragdesk_knowledge::RetrievedChunk;

/// Marker the model is told to emit when the context lacks the answer.
pub const NOT_FOUND_SENTINEL: &str = "NOT_FOUND_IN_EMBEDDINGS";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    Found(String),
    NotFound,
}

impl Synthesis {
    /// Classify a raw model reply. The sentinel anywhere in the reply,
    /// quoted or surrounded by other text, means not found. So does a reply
    /// that is blank, as happens when the backend returns no content.
    pub fn from_reply(reply: &str) -> Self {
        let reply = reply.trim();
        if reply.is_empty() || reply.contains(NOT_FOUND_SENTINEL) {
            Self::NotFound
        } else {
            Self::Found(reply.to_string())
        }
    }
}

pub struct Synthesizer {
    provider: Arc<dyn Provider>,
    params: GenerateParams,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn Provider>, params: GenerateParams) -> Self {
        Self { provider, params }
    }

    /// Answer `query` strictly from `chunks`.
    pub async fn answer_from_context(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Synthesis> {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!("🧠 Context: {} chunks, {} chars", chunks.len(), context.len());

        let reply = self.complete(grounded_prompt(&context, query)).await?;
        Ok(Synthesis::from_reply(&reply))
    }

    /// Restate a raw tabular answer from `department` as prose.
    pub async fn rewrite_tabular(&self, query: &str, department: &str, raw: &str) -> Result<String> {
        let text = self.complete(rewrite_prompt(department, raw, query)).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(RagDeskError::Other(format!("empty rewrite for {department} data")));
        }
        Ok(text.to_string())
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let response = self.provider.chat(&messages, &self.params).await?;
        Ok(response.text_or_empty().to_string())
    }
}

fn grounded_prompt(context: &str, query: &str) -> String {
    format!(
        "You are an enterprise assistant. Answer using only the facts in the context below.

Steps:
1. Understand the user's question.
2. Find the matching facts in the context.
3. Quote exact values and write a clear, helpful answer.
4. Mention the source of the data where you can.

If the context does not contain the answer, reply with exactly:
\"{NOT_FOUND_SENTINEL}\"

Never invent information.

---
Context:
{context}

Question:
{query}

Answer:
"
    )
}

fn rewrite_prompt(department: &str, raw: &str, query: &str) -> String {
    format!(
        "You are an enterprise assistant. The answer below came from the {dept} department's dataset.
Rewrite it as one clear, professional paragraph a person can read easily.
Leave out any email addresses and phone numbers.
---
Raw tabular answer:
{raw}

Question:
{query}

Answer:
",
        dept = capitalize(department),
    )
}

/// `finance` → `Finance`, `c-LEVEL` → `C-level`.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: "doc_0".into(),
            text: text.into(),
            department: "finance".into(),
            source: "report.md".into(),
            score: 1.0,
        }
    }

    #[test]
    fn test_sentinel_detected_by_substring() {
        assert_eq!(Synthesis::from_reply("NOT_FOUND_IN_EMBEDDINGS"), Synthesis::NotFound);
        assert_eq!(Synthesis::from_reply("\"NOT_FOUND_IN_EMBEDDINGS\""), Synthesis::NotFound);
        assert_eq!(
            Synthesis::from_reply("Unfortunately: NOT_FOUND_IN_EMBEDDINGS."),
            Synthesis::NotFound
        );
        assert_eq!(
            Synthesis::from_reply("Revenue was $5M"),
            Synthesis::Found("Revenue was $5M".into())
        );
    }

    #[test]
    fn test_blank_reply_is_not_found() {
        assert_eq!(Synthesis::from_reply(""), Synthesis::NotFound);
        assert_eq!(Synthesis::from_reply("  \n "), Synthesis::NotFound);
    }

    #[tokio::test]
    async fn test_blank_rewrite_is_an_error() {
        let synth = Synthesizer::new(
            Arc::new(ScriptedProvider::new(|_| "   ".into())),
            GenerateParams::default(),
        );
        assert!(synth.rewrite_tabular("?", "finance", "Q1 | 5000000").await.is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("finance"), "Finance");
        assert_eq!(capitalize("HR"), "Hr");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_context_reaches_prompt() {
        let provider = Arc::new(ScriptedProvider::new(|prompt| {
            if prompt.contains("Revenue Q1 was $5M") {
                "Revenue in Q1 was $5M.".into()
            } else {
                NOT_FOUND_SENTINEL.into()
            }
        }));
        let synth = Synthesizer::new(provider.clone(), GenerateParams::default());
        let found = synth
            .answer_from_context("What was revenue in Q1?", &[chunk("Revenue Q1 was $5M")])
            .await
            .unwrap();
        assert_eq!(found, Synthesis::Found("Revenue in Q1 was $5M.".into()));

        let missing = synth
            .answer_from_context("Who is the CEO?", &[chunk("Office hours are 9 to 5")])
            .await
            .unwrap();
        assert_eq!(missing, Synthesis::NotFound);
    }

    #[tokio::test]
    async fn test_rewrite_prompt_names_department() {
        let provider = Arc::new(ScriptedProvider::new(|prompt| {
            assert!(prompt.contains("Engineering department"));
            assert!(prompt.contains("Alice | 3"));
            "Alice leads three projects.".into()
        }));
        let synth = Synthesizer::new(provider, GenerateParams::default());
        let out = synth
            .rewrite_tabular("Who leads most projects?", "engineering", "engineer | projects\nAlice | 3")
            .await
            .unwrap();
        assert_eq!(out, "Alice leads three projects.");
    }
}
