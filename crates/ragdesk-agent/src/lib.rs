//! # RagDesk Agent
//!
//! Turns a `(query, role)` pair into exactly one answer.
//!
//! Documents are tried first: the vector retriever gathers chunks the role
//! may read and the synthesizer answers strictly from them. When that comes
//! up empty, the department datasets are asked, and their raw answers are
//! rewritten into prose. If both stages fail the caller gets a fixed
//! not-found message.

pub mod context;
pub mod router;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use context::ServiceContext;
pub use router::{NOT_FOUND_MESSAGE, QueryRouter, RouteOutcome};
pub use synthesizer::{NOT_FOUND_SENTINEL, Synthesis, Synthesizer};
