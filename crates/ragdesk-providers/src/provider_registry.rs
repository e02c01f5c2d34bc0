//! Known OpenAI-compatible backends.
//!
//! A backend is described by its base URL, where its API key comes from and
//! whether it serves embeddings. Chat always lives at `/chat/completions`
//! and embeddings at `/embeddings` relative to the base URL.

pub const CHAT_PATH: &str = "/chat/completions";
pub const EMBEDDINGS_PATH: &str = "/embeddings";

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Local servers; a key is sent only if one is configured.
    None,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    /// Empty when the deployment URL must come from config or env.
    pub base_url: &'static str,
    pub embeddings: bool,
    /// API key variables, tried in order.
    pub env_keys: &'static [&'static str],
    pub auth_style: AuthStyle,
    /// Variable overriding `base_url` (e.g. `OLLAMA_HOST`).
    pub base_url_env: Option<&'static str>,
}

impl ProviderConfig {
    pub fn embeddings_path(&self) -> Option<&'static str> {
        self.embeddings.then_some(EMBEDDINGS_PATH)
    }
}

const fn hosted(
    name: &'static str,
    base_url: &'static str,
    embeddings: bool,
    env_keys: &'static [&'static str],
    base_url_env: Option<&'static str>,
) -> ProviderConfig {
    ProviderConfig {
        name,
        base_url,
        embeddings,
        env_keys,
        auth_style: AuthStyle::Bearer,
        base_url_env,
    }
}

const fn local(name: &'static str, base_url: &'static str, host_env: &'static str) -> ProviderConfig {
    ProviderConfig {
        name,
        base_url,
        embeddings: true,
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some(host_env),
    }
}

static PROVIDERS: &[ProviderConfig] = &[
    hosted("openai", "https://api.openai.com/v1", true, &["OPENAI_API_KEY"], Some("OPENAI_API_BASE")),
    hosted("azure", "", true, &["AZURE_OPENAI_API_KEY"], Some("AZURE_OPENAI_ENDPOINT")),
    hosted("mistral", "https://api.mistral.ai/v1", true, &["MISTRAL_API_KEY"], None),
    hosted("openrouter", "https://openrouter.ai/api/v1", false, &["OPENROUTER_API_KEY"], None),
    hosted("groq", "https://api.groq.com/openai/v1", false, &["GROQ_API_KEY"], None),
    local("ollama", "http://localhost:11434/v1", "OLLAMA_HOST"),
    local("llamacpp", "http://localhost:8080/v1", "LLAMACPP_HOST"),
    local("vllm", "http://localhost:8001/v1", "VLLM_HOST"),
];

/// Look up a backend by name or alias.
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let name = match name {
        "azure_openai" | "azure-openai" => "azure",
        "llama.cpp" => "llamacpp",
        other => other,
    };
    PROVIDERS.iter().find(|p| p.name == name)
}

pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}
