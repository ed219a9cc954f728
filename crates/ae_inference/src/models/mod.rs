use std::sync::Arc;

use ae_core::error::preview;
use ae_core::{ProviderClient, ProviderError, Result};
use reqwest::Response;
use serde::Deserialize;
use tracing::info;

use crate::{InferenceConfig, ProviderKind};

pub mod deepseek;
pub mod dummy;
pub mod gemini;

pub use deepseek::DeepSeekModel;
pub use dummy::DummyModel;
pub use gemini::GeminiModel;

/// Build the provider client selected by `config`.
pub fn create_provider(config: &InferenceConfig) -> Result<Arc<dyn ProviderClient>> {
    config.validate()?;
    info!("Using {} provider with models {:?}", config.provider, config.model_chain());
    let provider: Arc<dyn ProviderClient> = match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiModel::new(config)?),
        ProviderKind::DeepSeek => Arc::new(DeepSeekModel::new(config)?),
        ProviderKind::Dummy => Arc::new(DummyModel::new()),
    };
    Ok(provider)
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Turn a non-success HTTP response into a [`ProviderError`], preferring the
/// `{"error": {"message": ...}}` body both providers use.
pub(crate) async fn error_from_response(model: &str, resp: Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body_text = resp.text().await.unwrap_or_default();
    ProviderError::new(model, http_error_message(status, &body_text))
}

/// Only a bounded preview of the body ever leaves the client.
fn http_error_message(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string());
    format!("HTTP {}: {}", status, preview(message.trim()))
}

pub(crate) fn request_error(model: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(model, "request timed out")
    } else {
        ProviderError::new(model, format!("request failed: {}", err))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use ae_core::{ProviderClient, ProviderError};
    use async_trait::async_trait;

    #[derive(Debug, Clone)]
    enum Scripted {
        Reply(String),
        Fail(String),
        Hang,
    }

    /// Provider double answering from a per-model script.
    ///
    /// Each model replays its queued answers in order and keeps repeating the
    /// last one. Models with no script fail.
    #[derive(Debug, Default)]
    pub struct ScriptedProvider {
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(self, model: &str, step: Scripted) -> Self {
            if let Ok(mut scripts) = self.scripts.lock() {
                scripts.entry(model.to_string()).or_default().push_back(step);
            }
            self
        }

        pub fn reply(self, model: &str, text: impl Into<String>) -> Self {
            self.push(model, Scripted::Reply(text.into()))
        }

        pub fn fail(self, model: &str, message: impl Into<String>) -> Self {
            self.push(model, Scripted::Fail(message.into()))
        }

        pub fn hang(self, model: &str) -> Self {
            self.push(model, Scripted::Hang)
        }

        /// Model ids in the order they were called.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn next_step(&self, model: &str) -> Option<Scripted> {
            let mut scripts = self.scripts.lock().ok()?;
            let queue = scripts.get_mut(model)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        }
    }

    #[async_trait]
    impl ProviderClient for ScriptedProvider {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn call(&self, model: &str, _prompt: &str) -> Result<String, ProviderError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(model.to_string());
            }
            match self.next_step(model) {
                Some(Scripted::Reply(text)) => Ok(text),
                Some(Scripted::Fail(message)) => Err(ProviderError::new(model, message)),
                Some(Scripted::Hang) => std::future::pending().await,
                None => Err(ProviderError::new(model, "model not found")),
            }
        }
    }
}
