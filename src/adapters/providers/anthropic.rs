//! Anthropic Messages API provider.
//!
//! Makes direct, non-streaming HTTP calls to `/v1/messages`. The same client
//! backs the LLM rubric judge.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{ConfigError, ProviderError};
use crate::domain::models::{ProviderConfig, SessionContext};
use crate::domain::ports::GenerationProvider;

const API_VERSION: &str = "2023-06-01";

/// Connection settings for the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (read from ANTHROPIC_API_KEY when unset).
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for AnthropicConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: API_VERSION.to_string(),
            timeout_secs: config.request_timeout_secs,
            max_tokens: config.max_tokens,
        }
    }
}

impl AnthropicConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageRole {
    User,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: MessageRole,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Thin Messages API client shared by the provider and the judge.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ConfigError::ValidationFailed(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    fn build_request(&self, model: &str, system: Option<&str>, user: &str) -> MessagesRequest {
        MessagesRequest {
            model: model.to_string(),
            max_tokens: self.config.max_tokens,
            system: system.map(str::to_string),
            messages: vec![Message {
                role: MessageRole::User,
                content: user.to_string(),
            }],
        }
    }

    /// Send one user message and return the concatenated text blocks.
    pub async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| ProviderError::Failed("ANTHROPIC_API_KEY not set".to_string()))?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&self.build_request(model, system, user))
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Failed(format!("API error {status}: {body}")));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let text: String = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::Failed(format!(
                "Empty completion (stop_reason: {})",
                result.stop_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
    }

    fn transport_error(&self, err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                after_ms: self.config.timeout_secs.saturating_mul(1000),
            }
        } else {
            ProviderError::Failed(err.to_string())
        }
    }
}

/// Generation provider backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    client: Arc<AnthropicClient>,
}

impl AnthropicProvider {
    pub fn new(client: Arc<AnthropicClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(AnthropicClient::new(
            AnthropicConfig::from(config),
        )?)))
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        _context: &SessionContext,
    ) -> Result<String, ProviderError> {
        let model = self.client.config().model.clone();
        self.client.complete(&model, None, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_provider_config() {
        let provider = ProviderConfig {
            base_url: "http://localhost:9000/".to_string(),
            api_key: Some("k".to_string()),
            ..ProviderConfig::default()
        };
        let config = AnthropicConfig::from(&provider);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.api_version, "2023-06-01");
        assert_eq!(config.get_api_key().as_deref(), Some("k"));
    }

    #[test]
    fn test_build_request_shape() {
        let client = AnthropicClient::new(AnthropicConfig::default()).unwrap();
        let request = client.build_request("m", Some("sys"), "hello");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["system"], "sys");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_build_request_omits_empty_system() {
        let client = AnthropicClient::new(AnthropicConfig::default()).unwrap();
        let json = serde_json::to_value(client.build_request("m", None, "hi")).unwrap();
        assert!(json.get("system").is_none());
    }
}
