//! Prose-tolerant JSON extraction from LLM responses.
//!
//! Models wrap their JSON in code fences or chatter despite instructions, so
//! we scan for the first position where a complete array (or object) parses
//! and ignore everything around it.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use sitesense_shared::{Result, SiteSenseError};

/// The first JSON array embedded in `text`.
pub fn first_json_array(text: &str) -> Result<Vec<Value>> {
    match first_value(text, '[') {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(SiteSenseError::parse(format!(
            "no JSON array in response ({})",
            preview(text)
        ))),
    }
}

/// The first JSON object embedded in `text`.
pub fn first_json_object(text: &str) -> Result<serde_json::Map<String, Value>> {
    match first_value(text, '{') {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(SiteSenseError::parse(format!(
            "no JSON object in response ({})",
            preview(text)
        ))),
    }
}

/// Deserialize the elements of the first array, dropping ones that do not fit `T`.
pub fn parse_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let items = first_json_array(text)?;
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if parsed.len() < total {
        debug!(dropped = total - parsed.len(), total, "dropped malformed array items");
    }
    Ok(parsed)
}

/// Deserialize the first object as `T`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T> {
    let map = first_json_object(text)?;
    serde_json::from_value(Value::Object(map))
        .map_err(|e| SiteSenseError::parse(format!("unexpected JSON shape: {e}")))
}

fn first_value(text: &str, open: char) -> Option<Value> {
    text.match_indices(open).find_map(|(start, _)| {
        // The stream deserializer stops after one complete value, so trailing
        // prose does not make the parse fail.
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()?
            .ok()
    })
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(80).collect();
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head
    }
}
