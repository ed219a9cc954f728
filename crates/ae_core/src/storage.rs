use async_trait::async_trait;

use crate::types::{Article, ArticlePatch, NewArticle};
use crate::Result;

/// The narrow view of the document store used by ingestion, the HTTP layer
/// and the enhancement pipeline. Per-document writes are atomic.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// All articles, ascending by `date`.
    async fn list_articles(&self) -> Result<Vec<Article>>;

    /// Original (non-derived) articles, ascending by `date`.
    async fn list_originals(&self) -> Result<Vec<Article>> {
        Ok(self
            .list_articles()
            .await?
            .into_iter()
            .filter(|a| a.original)
            .collect())
    }

    /// Fails with `NotFound` when absent.
    async fn get_article(&self, id: &str) -> Result<Article>;

    /// Fails with `DuplicateUrl` when the draft's url is already taken.
    async fn create_article(&self, article: NewArticle) -> Result<Article>;

    async fn update_article(&self, id: &str, patch: ArticlePatch) -> Result<Article>;

    /// Fails with `NotFound` when absent.
    async fn delete_article(&self, id: &str) -> Result<()>;

    /// Remove every derivative and return how many were removed.
    async fn delete_all_non_original(&self) -> Result<usize>;
}
