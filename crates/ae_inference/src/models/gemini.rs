use std::fmt;

use ae_core::{Error, ProviderClient, ProviderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_from_response, request_error};
use crate::InferenceConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiModel {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not configured".to_string()))?;
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

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ProviderClient for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn call(&self, model: &str, prompt: &str) -> std::result::Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(model, e))?;

        if !resp.status().is_success() {
            return Err(error_from_response(model, resp).await);
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::new(model, format!("unreadable response body: {}", e)))?;
        let text = body
            .into_text()
            .ok_or_else(|| ProviderError::new(model, "empty response"))?;
        debug!(model, len = text.len(), "Gemini answered");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderKind;

    #[test]
    fn test_endpoint_uses_model_id() {
        let config = InferenceConfig::new(ProviderKind::Gemini)
            .with_api_key("k")
            .with_api_base_url("http://localhost:9000/");
        let model = GeminiModel::new(&config).unwrap();
        assert_eq!(
            model.endpoint("gemini-1.5-flash-latest"),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_response_text_extraction() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(empty.into_text(), None);

        let blocked: GenerateResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(blocked.into_text(), None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = InferenceConfig::new(ProviderKind::Gemini).with_api_key("very-secret");
        let model = GeminiModel::new(&config).unwrap();
        assert!(!format!("{:?}", model).contains("very-secret"));
    }
}
