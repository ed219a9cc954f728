use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Appended to the source title of every enhanced article.
pub const ENHANCED_TITLE_SUFFIX: &str = " (AI Enhanced)";

/// Appended to the source url of every enhanced article, keeping the url unique.
pub const ENHANCED_URL_SUFFIX: &str = "/ai-enhanced";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub original: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
    pub date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Materialize a draft with a fresh id, as a store does on create.
    pub fn from_new(new: NewArticle) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            content: new.content,
            url: new.url,
            excerpt: new.excerpt,
            image: new.image,
            references: new.references,
            original: new.original,
            analytics: new.analytics,
            date: new.date,
            updated_at: now,
        }
    }

    /// Apply a partial update in place. `updated_at` is always refreshed.
    pub fn apply(&mut self, patch: ArticlePatch) -> Result<()> {
        patch.validate()?;
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(url) = patch.url {
            self.url = non_empty(Some(url));
        }
        if let Some(excerpt) = patch.excerpt {
            self.excerpt = Some(excerpt);
        }
        if let Some(image) = patch.image {
            self.image = Some(image);
        }
        if let Some(references) = patch.references {
            self.references = references;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Creation payload; the store assigns `id` and `updatedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default = "default_original")]
    pub original: bool,
    #[serde(default)]
    pub analytics: Option<Analytics>,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

fn default_original() -> bool {
    true
}

impl NewArticle {
    pub fn original(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            url: None,
            excerpt: None,
            image: None,
            references: Vec::new(),
            original: true,
            analytics: None,
            date: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Draft of the AI derivative of `source`, linked by title and url suffix.
    pub fn enhanced_from(source: &Article, content: String, analytics: Analytics) -> Self {
        Self {
            title: derived_title(&source.title),
            content,
            url: source.url.as_deref().map(derived_url),
            excerpt: source.excerpt.clone(),
            image: source.image.clone(),
            references: source.references.clone(),
            original: false,
            analytics: Some(analytics),
            date: Utc::now(),
        }
    }

    /// Checks the store-level invariants and normalizes an empty url to none.
    pub fn validate(mut self) -> Result<Self> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }
        self.url = non_empty(self.url);
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub references: Option<Vec<String>>,
}

impl ArticlePatch {
    fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        if matches!(&self.content, Some(c) if c.trim().is_empty()) {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }
        Ok(())
    }

    /// The url this patch would leave on the article, if it touches the url at all.
    pub fn new_url(&self) -> Option<Option<String>> {
        self.url.clone().map(|u| non_empty(Some(u)))
    }
}

/// One tuple as produced by the external page scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readability_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_ease: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("Positive"),
            Self::Neutral => f.write_str("Neutral"),
            Self::Negative => f.write_str("Negative"),
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

pub fn derived_title(title: &str) -> String {
    format!("{}{}", title, ENHANCED_TITLE_SUFFIX)
}

/// The url is kept verbatim so distinct source urls never share a derivative url.
pub fn derived_url(url: &str) -> String {
    format!("{}{}", url, ENHANCED_URL_SUFFIX)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
