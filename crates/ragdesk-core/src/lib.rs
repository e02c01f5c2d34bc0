//! # RagDesk Core
//!
//! Shared building blocks for every RagDesk crate:
//! - **config**: TOML configuration with per-field defaults
//! - **error**: the workspace-wide `RagDeskError` / `Result`
//! - **traits**: `Provider` (chat generation) and `Embedder` (vectors)
//! - **types**: chat messages and provider responses
//! - **access**: roles, access scopes and the static user directory

pub mod access;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use access::{AccessScope, User, UserDirectory};
pub use config::RagDeskConfig;
pub use error::{RagDeskError, Result};
