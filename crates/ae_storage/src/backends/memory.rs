use async_trait::async_trait;
use ae_core::{Article, ArticlePatch, ArticleStore, Error, NewArticle, PersistenceError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

/// Articles kept in insertion order; readers sort by date.
#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
}

impl MemoryStore {
    fn url_taken(&self, url: &str, except_id: Option<&str>) -> bool {
        self.articles
            .iter()
            .any(|a| a.url.as_deref() == Some(url) && Some(a.id.as_str()) != except_id)
    }

    fn sorted(&self, filter: impl Fn(&Article) -> bool) -> Vec<Article> {
        let mut articles: Vec<Article> = self.articles.iter().filter(|&a| filter(a)).cloned().collect();
        articles.sort_by(|a, b| a.date.cmp(&b.date));
        articles
    }

    pub fn create_article(&mut self, article: NewArticle) -> Result<Article> {
        let article = article.validate()?;
        if let Some(url) = &article.url {
            if self.url_taken(url, None) {
                return Err(PersistenceError::DuplicateUrl(url.clone()).into());
            }
        }
        let article = Article::from_new(article);
        self.articles.push(article.clone());
        Ok(article)
    }

    pub fn update_article(&mut self, id: &str, patch: ArticlePatch) -> Result<Article> {
        if let Some(Some(url)) = patch.new_url() {
            if self.url_taken(&url, Some(id)) {
                return Err(PersistenceError::DuplicateUrl(url).into());
            }
        }
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        article.apply(patch)?;
        Ok(article.clone())
    }

    pub fn delete_article(&mut self, id: &str) -> Result<()> {
        let before = self.articles.len();
        self.articles.retain(|a| a.id != id);
        if self.articles.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete_all_non_original(&mut self) -> usize {
        let before = self.articles.len();
        self.articles.retain(|a| a.original);
        before - self.articles.len()
    }
}

/// Process-local store. Each write holds the lock for its whole
/// check-then-insert sequence, so url uniqueness is never raced.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn connect(_url: Option<&str>) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn list_articles(&self) -> Result<Vec<Article>> {
        Ok(self.store.read().await.sorted(|_| true))
    }

    async fn list_originals(&self) -> Result<Vec<Article>> {
        Ok(self.store.read().await.sorted(|a| a.original))
    }

    async fn get_article(&self, id: &str) -> Result<Article> {
        self.store
            .read()
            .await
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn create_article(&self, article: NewArticle) -> Result<Article> {
        self.store.write().await.create_article(article)
    }

    async fn update_article(&self, id: &str, patch: ArticlePatch) -> Result<Article> {
        self.store.write().await.update_article(id, patch)
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        self.store.write().await.delete_article(id)
    }

    async fn delete_all_non_original(&self) -> Result<usize> {
        Ok(self.store.write().await.delete_all_non_original())
    }
}
