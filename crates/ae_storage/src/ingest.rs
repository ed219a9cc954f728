use std::time::Duration;

use ae_core::{bounded_store, ArticleStore, Error, NewArticle, PersistenceError, Result, ScrapedArticle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Scraped bodies are capped before storage.
pub const MAX_CONTENT_CHARS: usize = 5000;
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestStatus {
    Created { id: String },
    Duplicate,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestItem {
    pub url: String,
    pub title: String,
    #[serde(flatten)]
    pub status: IngestStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub items: Vec<IngestItem>,
}

impl IngestReport {
    pub fn created(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.status, IngestStatus::Created { .. }))
            .count()
    }
}

fn to_original(scraped: &ScrapedArticle) -> std::result::Result<NewArticle, String> {
    let title = scraped.title.trim();
    let content: String = scraped.content.trim().chars().take(MAX_CONTENT_CHARS).collect();
    if title.is_empty() {
        return Err("missing title".to_string());
    }
    if content.is_empty() {
        return Err("missing content".to_string());
    }
    let url = Url::parse(scraped.url.trim()).map_err(|e| format!("invalid url: {}", e))?;

    let excerpt = scraped
        .excerpt
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}...", content.chars().take(EXCERPT_CHARS).collect::<String>()));

    let mut article = NewArticle::original(title, content).with_url(url.as_str());
    article.excerpt = Some(excerpt);
    Ok(article)
}

/// Store scraped tuples as originals, in order. Already known urls are
/// skipped; only store failures other than duplicates abort the run, as do
/// `cancel` and a store call outliving `store_timeout`.
pub async fn ingest(
    store: &dyn ArticleStore,
    scraped: &[ScrapedArticle],
    cancel: &CancellationToken,
    store_timeout: Duration,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for item in scraped {
        let status = match to_original(item) {
            Err(reason) => {
                warn!("⚠️ Skipping scraped article '{}': {}", item.title, reason);
                IngestStatus::Rejected { reason }
            }
            Ok(article) => match bounded_store(cancel, store_timeout, store.create_article(article)).await {
                Ok(created) => {
                    info!("✅ Saved: {}", created.title);
                    IngestStatus::Created { id: created.id }
                }
                Err(Error::Persistence(PersistenceError::DuplicateUrl(url))) => {
                    info!("Already stored: {}", url);
                    IngestStatus::Duplicate
                }
                Err(Error::InvalidInput(reason)) => IngestStatus::Rejected { reason },
                Err(e) => return Err(e),
            },
        };
        report.items.push(IngestItem {
            url: item.url.clone(),
            title: item.title.clone(),
            status,
        });
    }

    info!("📖 Ingested {}/{} scraped articles", report.created(), scraped.len());
    Ok(report)
}
