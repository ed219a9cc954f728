use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ae_core::{Error, Result};
use url::Url;

pub mod contract;
pub mod enhancer;
pub mod fallback;
pub mod models;
pub mod prompt;

pub use contract::{parse_response, EnhancementResult};
pub use enhancer::{BatchItem, BatchReport, Enhancer, DEFAULT_BATCH_SIZE};
pub use fallback::{call_with_fallback, FallbackSuccess};
pub use models::create_provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    DeepSeek,
    Dummy,
}

impl ProviderKind {
    /// Model chain tried in order when none is configured, cheapest first.
    pub fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            Self::Gemini => &["gemini-1.5-flash-latest", "gemini-1.5-pro-latest", "gemini-2.0-flash-001"],
            Self::DeepSeek => &["deepseek-chat", "deepseek-reasoner"],
            Self::Dummy => &["dummy"],
        };
        models.iter().map(|m| m.to_string()).collect()
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::Dummy => "memory://dummy",
        }
    }

    fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Dummy => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::DeepSeek => f.write_str("deepseek"),
            Self::Dummy => f.write_str("dummy"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "deepseek" => Ok(Self::DeepSeek),
            "dummy" => Ok(Self::Dummy),
            other => Err(Error::Config(format!(
                "unknown provider '{}', available: gemini, deepseek, dummy",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct InferenceConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    /// Empty means the provider's default chain.
    pub models: Vec<String>,
    pub api_base_url: Option<String>,
    pub provider_timeout: Duration,
    pub store_timeout: Duration,
    pub batch_concurrency: usize,
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("models", &self.models)
            .field("api_base_url", &self.api_base_url)
            .field("provider_timeout", &self.provider_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            models: Vec::new(),
            api_base_url: None,
            provider_timeout: Duration::from_secs(60),
            store_timeout: Duration::from_secs(10),
            batch_concurrency: 1,
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

/// Split a comma separated model list, dropping blanks.
pub fn parse_models(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

impl InferenceConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(None)
    }

    /// Like [`InferenceConfig::from_env`], with `provider` taking precedence over `AE_PROVIDER`.
    pub fn from_env_with(provider: Option<ProviderKind>) -> Result<Self> {
        let provider = match (provider, std::env::var("AE_PROVIDER")) {
            (Some(kind), _) => kind,
            (None, Ok(p)) => p.parse()?,
            (None, Err(_)) => ProviderKind::Gemini,
        };
        let defaults = Self::new(provider);

        let api_key = provider
            .api_key_var()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| std::env::var("AE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        let models = std::env::var("AE_MODELS")
            .map(|m| parse_models(&m))
            .unwrap_or_default();

        let config = Self {
            provider,
            api_key,
            models,
            api_base_url: std::env::var("AE_API_BASE_URL").ok(),
            provider_timeout: env_secs("AE_PROVIDER_TIMEOUT_SECS").unwrap_or(defaults.provider_timeout),
            store_timeout: env_secs("AE_STORE_TIMEOUT_SECS").unwrap_or(defaults.store_timeout),
            batch_concurrency: std::env::var("AE_BATCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_concurrency),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency;
        self
    }

    /// The ordered model chain for the fallback strategy.
    pub fn model_chain(&self) -> Vec<String> {
        if self.models.is_empty() {
            self.provider.default_models()
        } else {
            self.models.clone()
        }
    }

    pub fn base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_base_url {
            Url::parse(url).map_err(|e| Error::Config(format!("invalid api base url '{}': {}", url, e)))?;
        }
        if self.batch_concurrency == 0 {
            return Err(Error::Config("batch concurrency must be at least 1".to_string()));
        }
        if self.provider_timeout.is_zero() || self.store_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}
