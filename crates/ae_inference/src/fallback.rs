use std::time::Duration;

use ae_core::{bounded, Error, Interrupted, ProviderClient, ProviderError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The first model in the chain that answered, and its raw answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSuccess {
    pub model: String,
    pub text: String,
}

/// Ask each model in `models`, strictly in order, until one answers.
///
/// Every attempt is bounded by `attempt_timeout`; a timeout counts as that
/// model's failure. When the chain is exhausted only the last failure is
/// kept, earlier ones are logged here. Cancellation stops the chain at once
/// and drops the in-flight call.
pub async fn call_with_fallback(
    provider: &dyn ProviderClient,
    prompt: &str,
    models: &[String],
    attempt_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<FallbackSuccess> {
    let mut last_error: Option<ProviderError> = None;

    for model in models {
        info!("[{}] Attempting to use model: {}", provider.name(), model);
        let failure = match bounded(cancel, attempt_timeout, provider.call(model, prompt)).await {
            Ok(Ok(text)) => {
                info!("[{}] Successfully used model: {}", provider.name(), model);
                return Ok(FallbackSuccess {
                    model: model.clone(),
                    text,
                });
            }
            Ok(Err(e)) => e,
            Err(Interrupted::TimedOut(limit)) => {
                ProviderError::new(model.as_str(), format!("no answer within {:?}", limit))
            }
            Err(Interrupted::Cancelled) => {
                warn!("[{}] Cancelled while waiting for model {}", provider.name(), model);
                return Err(Error::Cancelled);
            }
        };
        warn!("[{}] Model {} failed: {}", provider.name(), model, failure.message);
        last_error = Some(failure);
    }

    match last_error {
        Some(last) => Err(Error::AllModelsFailed {
            attempts: models.len(),
            last,
        }),
        None => Err(Error::InvalidInput("the model list is empty".to_string())),
    }
}
