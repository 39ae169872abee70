use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::shared::config::LlmConfig;

/// Thin client over an OpenAI-compatible completion/embedding API.
///
/// One unretried call per operation; failures carry the upstream status and
/// body text so the caller can surface them verbatim.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
    chat_model: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create LLM client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: config.api_token.as_ref().map(|t| format!("Bearer {t}")),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.auth_header.is_some()
    }

    /// One chat completion: system + user message in, assistant text out.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });
        self.chat_request(body).await
    }

    /// Chat completion with an inline image (data URI), for vision tasks.
    pub async fn chat_with_image(&self, prompt: &str, mime: &str, image_b64: &str) -> Result<String> {
        let body = json!({
            "model": self.chat_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {
                        "type": "image_url",
                        "image_url": {"url": format!("data:{mime};base64,{image_b64}")}
                    }
                ]
            }]
        });
        self.chat_request(body).await
    }

    async fn chat_request(&self, body: serde_json::Value) -> Result<String> {
        let response: ChatResponse = self
            .post_json("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse completion response: {}", e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow!("Completion response contained no content"))
    }

    /// Embed each input string; results come back in input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let response: EmbeddingResponse = self
            .post_json("embeddings", &body)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse embedding response: {}", e))?;

        if response.data.len() != inputs.len() {
            return Err(anyhow!(
                "Embedding response returned {} vectors for {} inputs",
                response.data.len(),
                inputs.len()
            ));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn post_json(&self, endpoint: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let auth = self
            .auth_header
            .as_ref()
            .ok_or_else(|| anyhow!("LLM token not configured (set AIPROXY_TOKEN)"))?;

        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "LLM request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("LLM request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response>".to_string());
            return Err(anyhow!("LLM service error ({}): {}", status, text));
        }

        Ok(response)
    }
}
