pub mod deadline;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use deadline::{bounded, bounded_store, Interrupted};
pub use error::{ContractError, ContractErrorKind, Error, PersistenceError, ProviderError};
pub use models::ProviderClient;
pub use storage::ArticleStore;
pub use types::{
    derived_title, derived_url, Analytics, Article, ArticlePatch, Entities, NewArticle,
    ScrapedArticle, Sentiment, ENHANCED_TITLE_SUFFIX, ENHANCED_URL_SUFFIX,
};

pub type Result<T> = std::result::Result<T, Error>;
