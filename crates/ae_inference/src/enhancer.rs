use std::sync::Arc;
use std::time::Duration;

use ae_core::{bounded_store, Article, ArticleStore, Error, NewArticle, ProviderClient, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::contract::parse_response;
use crate::fallback::call_with_fallback;
use crate::prompt::build_enhancement_prompt;
use crate::InferenceConfig;

/// Originals enhanced per batch run when no count is given.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Outcome of one source article in a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub source_id: String,
    pub source_title: String,
    pub outcome: Result<Article>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Derivatives removed before the run.
    pub deleted: usize,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Drives articles through prompt, model fallback, validation and storage.
#[derive(Clone)]
pub struct Enhancer {
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn ArticleStore>,
    models: Vec<String>,
    provider_timeout: Duration,
    store_timeout: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enhancer")
            .field("provider", &self.provider)
            .field("models", &self.models)
            .field("provider_timeout", &self.provider_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Enhancer {
    pub fn new(provider: Arc<dyn ProviderClient>, store: Arc<dyn ArticleStore>, config: &InferenceConfig) -> Self {
        Self {
            provider,
            store,
            models: config.model_chain(),
            provider_timeout: config.provider_timeout,
            store_timeout: config.store_timeout,
            concurrency: config.batch_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    /// Upper bound applied to every store call this enhancer makes.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Produce and persist the AI derivative of one original article.
    pub async fn enhance_one(&self, original: &Article, cancel: &CancellationToken) -> Result<Article> {
        if original.content.trim().is_empty() {
            warn!("Article {} has no content, skipping", original.id);
            return Err(Error::EmptyContent {
                id: original.id.clone(),
            });
        }
        if !original.original {
            return Err(Error::InvalidInput(format!(
                "article {} is already an enhanced version",
                original.id
            )));
        }

        info!("Processing: {}", original.title);
        let prompt = build_enhancement_prompt(&original.title, &original.content);
        let answer = call_with_fallback(
            self.provider.as_ref(),
            &prompt,
            &self.models,
            self.provider_timeout,
            cancel,
        )
        .await?;

        let result = parse_response(&answer.text).map_err(|e| {
            error!(
                "Contract violation from {}: {} (preview: {:?})",
                answer.model, e.message, e.preview
            );
            e
        })?;

        let draft = NewArticle::enhanced_from(original, result.enhanced_content, result.analytics);
        let created = bounded_store(cancel, self.store_timeout, self.store.create_article(draft)).await?;
        info!("💾 Saved enhanced version of '{}' as {}", original.title, created.id);
        Ok(created)
    }

    pub async fn enhance_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<Article> {
        let original = bounded_store(cancel, self.store_timeout, self.store.get_article(id)).await?;
        self.enhance_one(&original, cancel).await
    }

    /// Replace every derivative with fresh ones for up to `max_count`
    /// originals of `selection`, in order. Item failures do not stop the run.
    pub async fn enhance_batch(
        &self,
        selection: &[Article],
        max_count: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let deleted = bounded_store(cancel, self.store_timeout, self.store.delete_all_non_original()).await?;
        info!("🧹 Removed {} previously enhanced articles", deleted);

        let sources: Vec<&Article> = selection.iter().filter(|a| a.original).take(max_count).collect();
        let total = sources.len();
        info!("🚀 Enhancing {} articles", total);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let futures = sources.into_iter().enumerate().map(|(i, source)| {
            let semaphore = semaphore.clone();
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => self.enhance_one(source, cancel).await,
                    Err(_) => Err(Error::Cancelled),
                };
                match &outcome {
                    Ok(created) => info!("✅ [{}/{}] Created: {}", i + 1, total, created.title),
                    Err(e) => error!("❌ [{}/{}] Error processing '{}': {}", i + 1, total, source.title, e),
                }
                BatchItem {
                    source_id: source.id.clone(),
                    source_title: source.title.clone(),
                    outcome,
                }
            }
        });
        let items = join_all(futures).await;

        let report = BatchReport { deleted, items };
        info!(
            "Batch finished: {} created, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Batch over the store's originals, oldest first.
    pub async fn enhance_originals(&self, max_count: usize, cancel: &CancellationToken) -> Result<BatchReport> {
        let originals = bounded_store(cancel, self.store_timeout, self.store.list_originals()).await?;
        info!("📖 Found {} original articles", originals.len());
        self.enhance_batch(&originals, max_count, cancel).await
    }
}
