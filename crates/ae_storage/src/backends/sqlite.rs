use async_trait::async_trait;
use ae_core::{Article, ArticlePatch, ArticleStore, Error, NewArticle, PersistenceError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::StorageBackend;

const DEFAULT_DB_PATH: &str = "articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        url TEXT UNIQUE,
        excerpt TEXT,
        image TEXT,
        refs TEXT NOT NULL DEFAULT '[]',
        original INTEGER NOT NULL DEFAULT 1,
        analytics TEXT,
        date TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_date ON articles (date)",
    // Add future migrations here
];

pub struct SQLiteStorage {
    pool: SqlitePool,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn connect(url: Option<&str>) -> Result<Self> {
        let db_path = PathBuf::from(url.unwrap_or(DEFAULT_DB_PATH).trim_start_matches("sqlite:"));
        Self::new_with_path(&db_path).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| Error::Config(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::database(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool })
    }

    async fn write(&self, article: &Article, insert: bool) -> Result<()> {
        let sql = if insert {
            r#"
            INSERT INTO articles
            (title, content, url, excerpt, image, refs, original, analytics, date, updated_at, id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        } else {
            r#"
            UPDATE articles SET
            title = ?, content = ?, url = ?, excerpt = ?, image = ?, refs = ?,
            original = ?, analytics = ?, date = ?, updated_at = ?
            WHERE id = ?
            "#
        };
        let analytics = article
            .analytics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(sql)
            .bind(&article.title)
            .bind(&article.content)
            .bind(article.url.as_deref())
            .bind(article.excerpt.as_deref())
            .bind(article.image.as_deref())
            .bind(serde_json::to_string(&article.references)?)
            .bind(article.original)
            .bind(analytics)
            .bind(timestamp(&article.date))
            .bind(timestamp(&article.updated_at))
            .bind(&article.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, article.url.as_deref()))?;
        Ok(())
    }

    async fn select(&self, where_clause: &str) -> Result<Vec<Article>> {
        let sql = format!("SELECT * FROM articles {} ORDER BY date ASC", where_clause);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Failed to list articles: {}", e)))?;
        rows.iter().map(article_from_row).collect()
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    // fixed width so that text ordering equals time ordering
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("Failed to parse date: {}", e)))
}

fn map_write_error(e: sqlx::Error, url: Option<&str>) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if let Some(url) = url {
                return PersistenceError::DuplicateUrl(url.to_string()).into();
            }
        }
    }
    Error::database(format!("Failed to store article: {}", e))
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let refs: String = row.get("refs");
    let analytics = row
        .get::<Option<String>, _>("analytics")
        .map(|a| serde_json::from_str(&a))
        .transpose()?;

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        url: row.get("url"),
        excerpt: row.get("excerpt"),
        image: row.get("image"),
        references: serde_json::from_str(&refs)?,
        original: row.get("original"),
        analytics,
        date: parse_timestamp(&row.get::<String, _>("date"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn list_articles(&self) -> Result<Vec<Article>> {
        self.select("").await
    }

    async fn list_originals(&self) -> Result<Vec<Article>> {
        self.select("WHERE original = 1").await
    }

    async fn get_article(&self, id: &str) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Failed to get article: {}", e)))?;
        match row {
            Some(row) => article_from_row(&row),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn create_article(&self, article: NewArticle) -> Result<Article> {
        let article = Article::from_new(article.validate()?);
        self.write(&article, true).await?;
        Ok(article)
    }

    async fn update_article(&self, id: &str, patch: ArticlePatch) -> Result<Article> {
        let mut article = self.get_article(id).await?;
        article.apply(patch)?;
        self.write(&article, false).await?;
        Ok(article)
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Failed to delete article: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_all_non_original(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM articles WHERE original = 0")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Failed to delete derivatives: {}", e)))?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::{Analytics, Sentiment};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_storage() {
        // Create a temporary directory for the test database
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        let source = storage
            .create_article(NewArticle::original("Test Article", "Test content").with_url("http://example.com"))
            .await
            .unwrap();
        let analytics = Analytics {
            sentiment: Some(Sentiment::Neutral),
            keywords: vec!["chatbot".to_string()],
            ..Analytics::default()
        };
        let derived = storage
            .create_article(NewArticle::enhanced_from(&source, "## Test".to_string(), analytics))
            .await
            .unwrap();

        let fetched = storage.get_article(&derived.id).await.unwrap();
        assert_eq!(fetched.analytics, derived.analytics);
        assert!(!fetched.original);
        assert_eq!(storage.list_originals().await.unwrap().len(), 1);

        let err = storage
            .create_article(NewArticle::original("Other", "x").with_url("http://example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_url");

        assert_eq!(storage.delete_all_non_original().await.unwrap(), 1);
        assert!(matches!(storage.get_article(&derived.id).await, Err(Error::NotFound(_))));
        assert!(matches!(storage.delete_article(&derived.id).await, Err(Error::NotFound(_))));

        // Test database will be automatically cleaned up when temp_dir is dropped
    }

    #[tokio::test]
    async fn test_sqlite_update_refreshes_timestamp() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        let created = storage.create_article(NewArticle::original("A", "a")).await.unwrap();
        let patch = ArticlePatch {
            title: Some("B".to_string()),
            ..ArticlePatch::default()
        };
        let updated = storage.update_article(&created.id, patch).await.unwrap();
        assert_eq!(updated.title, "B");
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(storage.get_article(&created.id).await.unwrap().title, "B");
    }

    #[tokio::test]
    async fn test_sqlite_lists_oldest_first() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let inserts = [
            ("C", base + ChronoDuration::days(9), true),
            ("B", base + ChronoDuration::milliseconds(250), true),
            ("Derived", base - ChronoDuration::days(1), false),
            ("A", base, true),
        ];
        for (title, date, original) in inserts {
            let mut draft = NewArticle::original(title, "body")
                .with_url(format!("https://x.com/{}", title))
                .with_date(date);
            draft.original = original;
            storage.create_article(draft).await.unwrap();
        }

        let titles = |articles: Vec<Article>| articles.into_iter().map(|a| a.title).collect::<Vec<_>>();
        assert_eq!(
            titles(storage.list_articles().await.unwrap()),
            vec!["Derived", "A", "B", "C"]
        );
        assert_eq!(titles(storage.list_originals().await.unwrap()), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_sqlite_update_to_taken_url_is_duplicate() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        storage
            .create_article(NewArticle::original("A", "a").with_url("https://x.com/a"))
            .await
            .unwrap();
        let b = storage
            .create_article(NewArticle::original("B", "b").with_url("https://x.com/b"))
            .await
            .unwrap();

        let patch = ArticlePatch {
            url: Some("https://x.com/a".to_string()),
            ..ArticlePatch::default()
        };
        let err = storage.update_article(&b.id, patch).await.unwrap_err();
        assert!(matches!(
            &err,
            Error::Persistence(PersistenceError::DuplicateUrl(url)) if url == "https://x.com/a"
        ));
        assert_eq!(
            storage.get_article(&b.id).await.unwrap().url.as_deref(),
            Some("https://x.com/b")
        );
    }
}
