//! RagDesk configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagDeskError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagDeskConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub tabular: TabularConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl RagDeskConfig {
    /// Load config from `RAGDESK_CONFIG` or the default path (~/.ragdesk/config.toml).
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("RAGDESK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagDeskError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagDeskError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("⚙️ Loaded config from {}", path.display());
        Ok(config)
    }

    /// Serialize with every secret replaced by a marker.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut copy = self.clone();
        for key in [&mut copy.llm.api_key, &mut copy.embedding.api_key] {
            if !key.is_empty() {
                *key = "***".into();
            }
        }
        for user in &mut copy.access.users {
            user.password = "***".into();
        }
        toml::to_string_pretty(&copy)
            .map_err(|e| RagDeskError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the RagDesk home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragdesk")
    }
}

/// Expand `~` and env vars in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Chat-completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the registry base URL when non-empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String { "openai".into() }
fn default_chat_model() -> String { "gpt-4o-mini".into() }
fn default_temperature() -> f32 { 0.0 }
fn default_max_tokens() -> u32 { 1024 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            api_key: String::new(),
            endpoint: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String { "text-embedding-3-small".into() }
fn default_batch_size() -> usize { 100 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            api_key: String::new(),
            endpoint: String::new(),
            batch_size: default_batch_size(),
        }
    }
}

/// Timeouts and retry budget for every backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 { 60 }
fn default_max_retries() -> u32 { 2 }
fn default_retry_backoff_ms() -> u64 { 500 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Document indexing and vector retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks whose trimmed length is not above this are dropped.
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_docs_dir() -> String { "./markdown_documents".into() }
fn default_db_path() -> String { "~/.ragdesk/vector.db".into() }
fn default_collection() -> String { "company_docs".into() }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_min_chunk_len() -> usize { 20 }
fn default_top_k() -> usize { 10 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            db_path: default_db_path(),
            collection: default_collection(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_len: default_min_chunk_len(),
            top_k: default_top_k(),
        }
    }
}

/// Department datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Upper bound on rows rendered into a raw answer.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Rows shown to the model next to the schema.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_data_dir() -> String { "./uploaded_documents".into() }
fn default_max_rows() -> usize { 50 }
fn default_sample_rows() -> usize { 5 }

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_rows: default_max_rows(),
            sample_rows: default_sample_rows(),
        }
    }
}

/// Roles and the static user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_privileged_role")]
    pub privileged_role: String,
    #[serde(default = "default_fallback_department")]
    pub fallback_department: String,
    #[serde(default = "default_users")]
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub password: String,
    pub role: String,
}

fn default_privileged_role() -> String { "c-level".into() }
fn default_fallback_department() -> String { "general".into() }
fn default_users() -> Vec<UserEntry> {
    [
        ("Tony", "password123", "engineering"),
        ("Bruce", "securepass", "marketing"),
        ("Sam", "financepass", "finance"),
        ("Peter", "pete123", "c-level"),
        ("Sid", "sidpass123", "marketing"),
        ("Natasha", "hrpass123", "hr"),
    ]
    .into_iter()
    .map(|(name, password, role)| UserEntry {
        name: name.into(),
        password: password.into(),
        role: role.into(),
    })
    .collect()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            privileged_role: default_privileged_role(),
            fallback_department: default_fallback_department(),
            users: default_users(),
        }
    }
}

/// HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Raw uploads; CSV files here feed the tabular engine.
    #[serde(default = "default_data_dir")]
    pub upload_dir: String,
    /// Normalized markdown copies of uploaded documents.
    #[serde(default = "default_docs_dir")]
    pub markdown_dir: String,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upload_dir: default_data_dir(),
            markdown_dir: default_docs_dir(),
        }
    }
}
