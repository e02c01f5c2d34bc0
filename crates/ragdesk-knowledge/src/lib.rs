//! # RagDesk Knowledge
//!
//! The document half of RagDesk: normalized text in, department-tagged
//! vectors out.
//!
//! ## Pipeline
//! ```text
//! <docs_dir>/<department>/*.md|*.txt
//!   ↓ extract (markdown → text, front matter stripped)
//!   ↓ chunk (recursive splitter, 500 chars / 50 overlap, ≤ 20 chars dropped)
//!   ↓ embed (batches of 100)
//! SQLite vector store, ids doc_0, doc_1, ...
//!   ↓ cosine search, filtered by department unless privileged
//! Retriever → top-k chunks with source metadata
//! ```
//!
//! The store is append-only. Re-indexing a document adds a second copy of
//! its chunks.

pub mod chunker;
pub mod extract;
pub mod indexer;
pub mod retriever;
pub mod store;

#[cfg(test)]
mod testing;

pub use chunker::{Chunk, Chunker};
pub use extract::{DocumentKind, save_as_markdown};
pub use indexer::{IndexReport, Indexer};
pub use retriever::{RetrievedChunk, Retriever};
pub use store::VectorStore;
