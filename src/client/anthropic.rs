// Anthropic Messages API client
use crate::client::traits::{CompletionRequest, CompletionService, ServiceError};
use crate::model::CompletionError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, CompletionError> {
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey("<empty>".into()));
        }
        let client = Client::builder()
            .user_agent(concat!("car-recommender/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Service(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

/// Concatenates the text blocks of a Messages API reply.
fn extract_text(body: &str) -> Result<String, ServiceError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::new(None, format!("unexpected response body: {}", e)))?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    Ok(text)
}

#[async_trait::async_trait]
impl CompletionService for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });

        let response = self
            .client
            .post(self.build_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::new(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            warn!("Completion API responded [{}]: {}", status, text);
            return Err(ServiceError::new(Some(status.as_u16()), text));
        }
        debug!("Completion API response [{}]: {}", status, text);
        extract_text(&text)
    }
}
