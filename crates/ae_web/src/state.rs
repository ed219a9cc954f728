use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ae_core::{bounded_store, ArticleStore, Result};
use ae_inference::Enhancer;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub enhancer: Enhancer,
    /// Fired on server shutdown; in-flight enhancements observe it.
    pub shutdown: CancellationToken,
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, enhancer: Enhancer) -> Self {
        let store_timeout = enhancer.store_timeout();
        Self {
            store,
            enhancer,
            shutdown: CancellationToken::new(),
            store_timeout,
        }
    }

    /// Run a store call under the store timeout and the shutdown token.
    pub async fn store_call<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded_store(&self.shutdown, self.store_timeout, fut).await
    }
}
