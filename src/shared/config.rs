use std::path::PathBuf;

use anyhow::Result;

/// Default endpoint of the OpenAI-compatible proxy the agent talks to.
const DEFAULT_LLM_BASE_URL: &str = "https://aiproxy.sanand.workers.dev/openai/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Process-wide configuration, resolved once at startup and injected into
/// every component. Handlers never read the environment themselves.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub data_root: PathBuf,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    /// Bearer token for the proxy; LLM-backed tasks fail cleanly without it.
    pub api_token: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl AgentConfig {
    pub fn resolve(host: String, port: u16, data_root: &str) -> Result<Self> {
        let llm = LlmConfig {
            base_url: std::env::var("AIPROXY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_token: std::env::var("AIPROXY_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            chat_model: std::env::var("AGENT_CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: std::env::var("AGENT_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            timeout_secs: std::env::var("AGENT_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
        };

        Ok(Self {
            host,
            port,
            data_root: PathBuf::from(data_root),
            llm,
        })
    }
}
