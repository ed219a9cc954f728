use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Number of characters of a provider payload kept for diagnostics.
pub const PREVIEW_CHARS: usize = 200;

/// A single model call that did not produce a usable answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("model {model} failed: {message}")]
pub struct ProviderError {
    pub model: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    InvalidJson,
    MissingField,
}

impl fmt::Display for ContractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => f.write_str("invalid JSON"),
            Self::MissingField => f.write_str("missing field"),
        }
    }
}

/// The provider answered, but not with the agreed JSON shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("provider response violated the output contract ({kind}): {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
    /// At most [`PREVIEW_CHARS`] characters of the offending text.
    pub preview: Option<String>,
}

impl ContractError {
    pub fn invalid_json(message: impl Into<String>, raw: &str) -> Self {
        Self {
            kind: ContractErrorKind::InvalidJson,
            message: message.into(),
            preview: Some(preview(raw)),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self {
            kind: ContractErrorKind::MissingField,
            message: format!("required field `{}` is missing or empty", field),
            preview: None,
        }
    }
}

/// Bounded diagnostic prefix of a payload, cut on a char boundary.
pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("an article with url {0} already exists")]
    DuplicateUrl(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("article {id} has no content to enhance")]
    EmptyContent { id: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("all {attempts} models failed, last error: {last}")]
    AllModelsFailed { attempts: usize, last: ProviderError },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("article not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable name, used at the HTTP boundary and in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyContent { .. } => "empty_content",
            Self::Provider(_) => "provider_error",
            Self::AllModelsFailed { .. } => "all_models_failed",
            Self::Contract(e) => match e.kind {
                ContractErrorKind::InvalidJson => "contract_invalid_json",
                ContractErrorKind::MissingField => "contract_missing_field",
            },
            Self::Persistence(PersistenceError::DuplicateUrl(_)) => "duplicate_url",
            Self::Persistence(PersistenceError::Timeout(_)) => "persistence_timeout",
            Self::Persistence(PersistenceError::Database(_)) => "persistence_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }

    pub fn database(message: impl fmt::Display) -> Self {
        Self::Persistence(PersistenceError::Database(message.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
