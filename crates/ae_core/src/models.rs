use async_trait::async_trait;
use std::fmt;

use crate::error::ProviderError;

/// A generative provider able to answer one prompt with one named model.
///
/// Implementations never retry; switching models is the caller's job.
#[async_trait]
pub trait ProviderClient: Send + Sync + fmt::Debug {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Send `prompt` to `model` and return the raw text of the answer.
    async fn call(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}
