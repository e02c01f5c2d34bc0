//! # RagDesk Gateway
//!
//! HTTP API over the query router.
//!
//! | route | auth | |
//! |---|---|---|
//! | `GET /health` | none | liveness |
//! | `GET /login` | Basic | welcome message and role |
//! | `POST /chat` | Basic | `{message}` → `{answer}` |
//! | `POST /upload` | Basic, privileged | store a document or dataset |
//! | `GET /api/v1/stats` | Basic | vector and dataset counts |
//! | `POST /api/v1/reindex` | Basic, privileged | index the document tree |

pub mod auth;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
