//! Error types shared across the workspace.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagDeskError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("API key missing for provider '{0}'")]
    ApiKeyMissing(String),

    #[error("Unknown provider '{0}'")]
    ProviderNotFound(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Tabular error: {0}")]
    Tabular(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl RagDeskError {
    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures, timeouts, rate limits and 5xx responses are
    /// transient; everything else is returned to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RagDeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(format!("JSON error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, RagDeskError>;
