use std::fmt;

use ae_core::{Error, ProviderClient, ProviderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_from_response, request_error};
use crate::InferenceConfig;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client for DeepSeek.
pub struct DeepSeekModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for DeepSeekModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepSeekModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DeepSeekModel {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("DeepSeek API key is required".to_string()))?;
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url(),
        })
    }
}

#[async_trait]
impl ProviderClient for DeepSeekModel {
    fn name(&self) -> &str {
        "DeepSeek"
    }

    async fn call(&self, model: &str, prompt: &str) -> std::result::Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(model, e))?;

        if !resp.status().is_success() {
            return Err(error_from_response(model, resp).await);
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::new(model, format!("unreadable response body: {}", e)))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::new(model, "empty response"))?;
        debug!(model, len = text.len(), "DeepSeek answered");
        Ok(text)
    }
}
