//! Validation of the provider's answer against the enhancement contract:
//!
//! ```json
//! { "enhancedContent": "<markdown>",
//!   "analytics": { "sentiment": "...", "tone": "...", "readabilityScore": 0, "keywords": [] } }
//! ```
//!
//! Only `enhancedContent` and `analytics` are load-bearing; analytics
//! sub-fields are read best-effort and left absent when unusable.

use ae_core::{Analytics, ContractError, Entities, Sentiment};
use serde_json::{Map, Value};
use tracing::debug;

/// A validated answer, ready to become a derivative article.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementResult {
    pub enhanced_content: String,
    pub analytics: Analytics,
}

/// Remove code fences wrapped around the whole answer, with or without a
/// language tag, plus any stray leading/trailing backticks.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with('`') {
        text = text.trim_start_matches('`');
        let tag_len = text
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(text.len());
        text = &text[tag_len..];
    }
    text.trim_end().trim_end_matches('`').trim()
}

/// Outermost ```-fenced block in `text`, for answers with prose around the fence.
///
/// Runs from the first opening fence to the last closing one, so fences
/// quoted inside the payload stay part of it.
fn outer_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip optional language identifier on the same line
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];
    let end = content.rfind("```")?;
    Some(content[..end].trim())
}

fn clean(raw: &str) -> &str {
    let stripped = strip_fences(raw);
    if stripped.starts_with('{') {
        return stripped;
    }
    match outer_fenced_block(raw) {
        Some(block) if block.starts_with('{') => block,
        _ => stripped,
    }
}

/// Parse a raw provider answer into an [`EnhancementResult`].
pub fn parse_response(raw: &str) -> Result<EnhancementResult, ContractError> {
    let cleaned = clean(raw);
    debug!(raw_len = raw.len(), cleaned_len = cleaned.len(), "cleaned provider response");

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ContractError::invalid_json(format!("Invalid JSON response from AI: {}", e), cleaned))?;

    let enhanced_content = value
        .get("enhancedContent")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ContractError::missing_field("enhancedContent"))?;

    let analytics = value
        .get("analytics")
        .and_then(Value::as_object)
        .ok_or_else(|| ContractError::missing_field("analytics"))?;

    Ok(EnhancementResult {
        enhanced_content: enhanced_content.to_string(),
        analytics: read_analytics(analytics),
    })
}

fn read_analytics(map: &Map<String, Value>) -> Analytics {
    Analytics {
        sentiment: map
            .get("sentiment")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Sentiment>().ok()),
        tone: text_field(map, "tone"),
        readability_score: map.get("readabilityScore").and_then(read_score),
        reading_ease: text_field(map, "readingEase"),
        keywords: map.get("keywords").map(string_list).unwrap_or_default(),
        entities: map.get("entities").and_then(Value::as_object).map(|e| Entities {
            people: e.get("people").map(string_list).unwrap_or_default(),
            organizations: e.get("organizations").map(string_list).unwrap_or_default(),
            locations: e.get("locations").map(string_list).unwrap_or_default(),
        }),
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Scores arrive as integers, floats or numeric strings; clamp into 0..=100.
fn read_score(value: &Value) -> Option<u8> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    Some(score.round().clamp(0.0, 100.0) as u8)
}

/// Accepts a JSON array of strings or a single comma separated string.
fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(s) => s.split(',').collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
