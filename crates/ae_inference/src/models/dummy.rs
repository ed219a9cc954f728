use std::collections::HashSet;
use std::fmt;

use ae_core::{ProviderClient, ProviderError};
use async_trait::async_trait;
use serde_json::json;

use crate::prompt::extract_source;

const MAX_KEYWORDS: usize = 8;

/// Offline provider that "enhances" by restructuring the source text.
/// Answers are a pure function of the prompt.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 5)
        .map(str::to_lowercase)
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Shorter sentences read easier; 10 words or fewer scores 100.
fn readability(text: &str) -> u8 {
    let sentences = text
        .split(|c: char| c == '.' || c == '!' || c == '?')
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let words = text.split_whitespace().count();
    let avg = words as f64 / sentences as f64;
    (100.0 - (avg - 10.0).max(0.0) * 3.0).clamp(0.0, 100.0).round() as u8
}

fn restructure(title: &str, content: &str) -> String {
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let mut out = format!("# {}\n\n", title.trim());
    out.push_str(&paragraphs.join("\n\n"));
    out
}

#[async_trait]
impl ProviderClient for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn call(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let (title, content) =
            extract_source(prompt).ok_or_else(|| ProviderError::new(model, "prompt carries no article"))?;
        let answer = json!({
            "enhancedContent": restructure(title, content),
            "analytics": {
                "sentiment": "Neutral",
                "tone": "Informative",
                "readabilityScore": readability(content),
                "keywords": keywords(content),
            }
        });
        tracing::debug!("Dummy answer for '{}'", title);
        Ok(answer.to_string())
    }
}
