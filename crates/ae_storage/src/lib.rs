use async_trait::async_trait;
use ae_core::{ArticleStore, Error, Result};
use std::sync::Arc;

pub mod backends;
pub mod ingest;

pub use backends::*;
pub use ingest::{ingest, IngestReport, IngestStatus};

/// A store implementation that can be opened from a connection string.
#[async_trait]
pub trait StorageBackend: ArticleStore + Sized {
    async fn connect(url: Option<&str>) -> Result<Self>;
}

/// Names accepted by [`create_storage`].
pub fn available_backends() -> Vec<&'static str> {
    let mut names = vec!["memory"];
    if cfg!(feature = "sqlite") {
        names.push("sqlite");
    }
    names
}

/// Open the backend called `kind`. `url` is backend specific (a file path for sqlite).
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStorage::connect(url).await?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SQLiteStorage::connect(url).await?)),
        other => Err(Error::Config(format!(
            "unknown storage backend '{}', available: {}",
            other,
            available_backends().join(", ")
        ))),
    }
}
