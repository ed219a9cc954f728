use ae_core::{Article, ArticlePatch, Error, NewArticle, ScrapedArticle};
use ae_inference::{BatchItem, BatchReport, DEFAULT_BATCH_SIZE};
use ae_storage::{ingest, IngestReport};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// GET /api/articles
pub async fn list_articles(State(state): State<AppState>) -> ApiResult<Json<Vec<Article>>> {
    Ok(Json(state.store_call(state.store.list_articles()).await?))
}

/// GET /api/articles/:id
pub async fn get_article(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Article>> {
    Ok(Json(state.store_call(state.store.get_article(&id)).await?))
}

/// POST /api/articles
pub async fn create_article(
    State(state): State<AppState>,
    Json(article): Json<NewArticle>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    let created = state.store_call(state.store.create_article(article)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/articles/:id
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ArticlePatch>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.store_call(state.store.update_article(&id, patch)).await?))
}

/// DELETE /api/articles/:id
pub async fn delete_article(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.store_call(state.store.delete_article(&id)).await?;
    Ok(Json(json!({ "message": "Article deleted" })))
}

/// POST /api/articles/:id/enhance
pub async fn enhance_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    let created = state.enhancer.enhance_by_id(&id, &state.shutdown.child_token()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub max_count: Option<usize>,
    /// Explicit selection; defaults to the stored originals, oldest first.
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemView {
    pub source_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl From<BatchItem> for BatchItemView {
    fn from(item: BatchItem) -> Self {
        let (article, error) = match item.outcome {
            Ok(article) => (Some(article), None),
            Err(e) => (None, Some(json!({ "kind": e.kind(), "message": e.to_string() }))),
        };
        Self {
            source_id: item.source_id,
            title: item.source_title,
            article,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReportView {
    pub deleted: usize,
    pub created: usize,
    pub failed: usize,
    pub items: Vec<BatchItemView>,
}

impl From<BatchReport> for BatchReportView {
    fn from(report: BatchReport) -> Self {
        Self {
            deleted: report.deleted,
            created: report.succeeded(),
            failed: report.failed(),
            items: report.items.into_iter().map(BatchItemView::from).collect(),
        }
    }
}

/// POST /api/enhance
pub async fn enhance_batch(
    State(state): State<AppState>,
    request: Option<Json<BatchRequest>>,
) -> ApiResult<Json<BatchReportView>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cancel = state.shutdown.child_token();

    let report = match request.ids {
        Some(ids) => {
            let mut selection = Vec::with_capacity(ids.len());
            for id in &ids {
                selection.push(state.store_call(state.store.get_article(id)).await?);
            }
            let max_count = request.max_count.unwrap_or(selection.len());
            state.enhancer.enhance_batch(&selection, max_count, &cancel).await?
        }
        None => {
            let max_count = request.max_count.unwrap_or(DEFAULT_BATCH_SIZE);
            state.enhancer.enhance_originals(max_count, &cancel).await?
        }
    };
    Ok(Json(report.into()))
}

/// POST /api/ingest
pub async fn ingest_articles(
    State(state): State<AppState>,
    Json(scraped): Json<Vec<ScrapedArticle>>,
) -> ApiResult<Json<IngestReport>> {
    if scraped.is_empty() {
        return Err(Error::InvalidInput("nothing to ingest".to_string()).into());
    }
    info!("📥 Ingesting {} scraped articles", scraped.len());
    let report = ingest(state.store.as_ref(), &scraped, &state.shutdown, state.store_timeout).await?;
    Ok(Json(report))
}
