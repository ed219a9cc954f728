use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route(
            "/api/articles",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route(
            "/api/articles/:id",
            get(handlers::get_article)
                .put(handlers::update_article)
                .delete(handlers::delete_article),
        )
        .route("/api/articles/:id/enhance", post(handlers::enhance_article))
        .route("/api/enhance", post(handlers::enhance_batch))
        .route("/api/ingest", post(handlers::ingest_articles))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::{ArticleStore, NewArticle};
    use ae_inference::models::test_support::ScriptedProvider;
    use ae_inference::models::DummyModel;
    use ae_inference::{Enhancer, InferenceConfig, ProviderKind};
    use ae_storage::MemoryStorage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_app(provider: Arc<dyn ae_core::ProviderClient>, models: &[&str]) -> (Router, Arc<MemoryStorage>) {
        let store = Arc::new(MemoryStorage::new());
        let config = InferenceConfig::new(ProviderKind::Dummy).with_models(models.iter().copied());
        let enhancer = Enhancer::new(provider, store.clone(), &config);
        (create_app(AppState::new(store.clone(), enhancer)), store)
    }

    fn dummy_app() -> (Router, Arc<MemoryStorage>) {
        make_app(Arc::new(DummyModel::new()), &["dummy"])
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 256)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn seed(store: &MemoryStorage, title: &str) -> String {
        store
            .create_article(
                NewArticle::original(title, format!("Body of {}", title))
                    .with_url(format!("https://beyondchats.com/blogs/{}", title.to_lowercase())),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_and_get_article() {
        let (app, _store) = dummy_app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/articles",
                json!({"title": "Chatbots", "content": "Body", "url": "https://example.com/a"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        assert_eq!(created["original"], true);
        let id = created["id"].as_str().unwrap().to_string();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/articles/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["title"], "Chatbots");
    }

    #[tokio::test]
    async fn test_duplicate_url_is_conflict() {
        let (app, store) = dummy_app();
        seed(&store, "Chatbots").await;
        let resp = app
            .oneshot(post_json(
                "/api/articles",
                json!({"title": "Again", "content": "Body", "url": "https://beyondchats.com/blogs/chatbots"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "duplicate_url");
    }

    #[tokio::test]
    async fn test_update_and_delete_article() {
        let (app, store) = dummy_app();
        let id = seed(&store, "Chatbots").await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/articles/{}", id))
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"title": "Renamed"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["title"], "Renamed");

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/articles/{}", id))
                .body(Body::empty())
                .unwrap()
        };
        let resp = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "Article deleted");

        let resp = app.oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_enhance_single_article() {
        let (app, store) = dummy_app();
        let id = seed(&store, "Chatbots").await;

        let resp = app
            .oneshot(post_json(&format!("/api/articles/{}/enhance", id), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        assert_eq!(created["original"], false);
        assert_eq!(created["title"], "Chatbots (AI Enhanced)");
        assert!(created["analytics"]["keywords"].is_array());
        assert_eq!(store.list_articles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enhance_missing_article_is_not_found() {
        let (app, _store) = dummy_app();
        let resp = app
            .oneshot(post_json("/api/articles/nope/enhance", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["kind"], "not_found");
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_enhance_provider_failure_is_server_error() {
        let (app, store) = make_app(Arc::new(ScriptedProvider::new().fail("m1", "quota exceeded")), &["m1"]);
        let id = seed(&store, "Chatbots").await;
        let resp = app
            .oneshot(post_json(&format!("/api/articles/{}/enhance", id), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["kind"], "all_models_failed");
        assert_eq!(store.list_articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_enhance_reports_items() {
        let (app, store) = dummy_app();
        for title in ["A", "B", "C", "D"] {
            seed(&store, title).await;
        }
        let resp = app
            .oneshot(post_json("/api/enhance", json!({"maxCount": 2})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report = body_json(resp).await;
        assert_eq!(report["deleted"], 0);
        assert_eq!(report["created"], 2);
        assert_eq!(report["items"].as_array().unwrap().len(), 2);
        assert_eq!(report["items"][0]["title"], "A");
    }

    #[tokio::test]
    async fn test_batch_with_explicit_ids() {
        let (app, store) = dummy_app();
        seed(&store, "A").await;
        let b = seed(&store, "B").await;
        let resp = app
            .oneshot(post_json("/api/enhance", json!({"ids": [b]})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report = body_json(resp).await;
        assert_eq!(report["created"], 1);
        assert_eq!(report["items"][0]["title"], "B");
    }

    #[tokio::test]
    async fn test_ingest_endpoint() {
        let (app, store) = dummy_app();
        let resp = app
            .oneshot(post_json(
                "/api/ingest",
                json!([
                    {"title": "First", "url": "https://beyondchats.com/blogs/first", "content": "Body"},
                    {"title": "", "url": "https://beyondchats.com/blogs/second", "content": "Body"}
                ]),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report = body_json(resp).await;
        assert_eq!(report["items"][0]["status"], "created");
        assert_eq!(report["items"][1]["status"], "rejected");
        assert_eq!(store.list_originals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_calls_stop_on_shutdown() {
        let store = Arc::new(MemoryStorage::new());
        seed(&store, "Chatbots").await;
        let config = InferenceConfig::new(ProviderKind::Dummy).with_models(["dummy"]);
        let enhancer = Enhancer::new(Arc::new(DummyModel::new()), store.clone(), &config);
        let state = AppState::new(store.clone(), enhancer);
        assert_eq!(state.store_timeout, config.store_timeout);
        state.shutdown.cancel();
        let app = create_app(state);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/api/articles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(resp).await["kind"], "cancelled");

        let resp = app
            .oneshot(post_json(
                "/api/ingest",
                json!([{"title": "New", "url": "https://beyondchats.com/blogs/new", "content": "Body"}]),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.list_articles().await.unwrap().len(), 1);
    }
}
