use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PersistenceError;
use crate::Error;

/// Why a bounded call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

/// Run `fut` until it finishes, `limit` elapses or `cancel` fires.
///
/// On interruption the future is dropped, abandoning any in-flight I/O.
pub async fn bounded<F, T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> std::result::Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| Interrupted::TimedOut(limit)),
    }
}

/// Bound a store call; a timeout surfaces as a persistence failure.
pub async fn bounded_store<F, T>(cancel: &CancellationToken, limit: Duration, fut: F) -> crate::Result<T>
where
    F: Future<Output = crate::Result<T>>,
{
    match bounded(cancel, limit, fut).await {
        Ok(res) => res,
        Err(Interrupted::Cancelled) => Err(Error::Cancelled),
        Err(Interrupted::TimedOut(limit)) => Err(PersistenceError::Timeout(limit).into()),
    }
}
