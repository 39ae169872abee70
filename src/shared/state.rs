use anyhow::Result;

use crate::shared::config::AgentConfig;
use crate::shared::llm::LlmClient;
use crate::shared::sandbox::Sandbox;

/// Shared service state: the resolved configuration plus the long-lived
/// clients every handler borrows. Handlers hold no state of their own.
pub struct AppState {
    pub config: AgentConfig,
    pub sandbox: Sandbox,
    pub llm: LlmClient,
    pub http: reqwest::Client,
}

/// State over a throwaway data root, for handler tests.
#[cfg(test)]
pub(crate) fn test_state(root: &std::path::Path) -> AppState {
    let config = AgentConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_root: root.to_path_buf(),
        llm: crate::shared::config::LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_token: None,
            chat_model: "test-chat".to_string(),
            embedding_model: "test-embed".to_string(),
            timeout_secs: 1,
        },
    };
    AppState::new(config).expect("test state")
}

impl AppState {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let sandbox = Sandbox::new(config.data_root.clone());
        let llm = LlmClient::new(&config.llm)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .user_agent(concat!("autoagent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            sandbox,
            llm,
            http,
        })
    }
}
