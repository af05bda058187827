//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use sap_core::config::ChatConfig;
use sap_core::error::{Error, Result};
use sap_core::traits::ChatCompleter;
use sap_core::types::ChatMessage;

use crate::http::{join_url, transport_error, truncate};

#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatClient {
    pub fn new(config: &ChatConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("missing chat API key".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(Error::InvalidConfig("missing chat model name".to_string()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| Error::InvalidConfig("invalid chat API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build chat HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: join_url(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build a client reading the API key from `config.api_key_env`.
    pub fn from_env(config: &ChatConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .map_err(|_| Error::InvalidConfig(format!("{} not set", config.api_key_env)))?;
        Self::new(config, &key)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatCompleter for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.endpoint, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::ProviderError(format!(
                "chat completion failed ({status}): {}",
                truncate(&body, 512)
            )));
        }
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderError(format!("failed to parse chat completion: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::ProviderError("chat completion returned no content".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
