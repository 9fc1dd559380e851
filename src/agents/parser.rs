// src/agents/parser.rs — Decode model output into typed agent results
//
// Model JSON output is unreliable: responses arrive bare, fenced in
// ```json blocks, or wrapped in prose. Every agent call site decodes
// through here so the per-item skip path is explicit and testable.

use serde::de::DeserializeOwned;

use crate::core::types::AgentType;

use super::ItemFailure;

/// Decode a typed value from raw model output. Tries the full text
/// first, then the outermost JSON object it can find.
pub fn decode<T: DeserializeOwned>(raw: &str, stage: AgentType) -> Result<T, ItemFailure> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let Some(candidate) = extract_json(trimmed) {
        return serde_json::from_str::<T>(candidate).map_err(|e| {
            ItemFailure::new(stage, format!("invalid JSON payload: {}", e))
        });
    }

    Err(ItemFailure::new(
        stage,
        format!("no JSON object in response ({} chars)", raw.len()),
    ))
}

/// Locate the outermost JSON object in a response, looking inside
/// fenced code blocks first.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
