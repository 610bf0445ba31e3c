// Structured output parsing - pulls a JSON object out of a model reply and
// checks it against the expected shape

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("reply contains no JSON object")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("schema violation: {0}")]
    Schema(String),
}

static JSON_BLOCK_PATTERN: OnceLock<Regex> = OnceLock::new();

fn get_json_block_pattern() -> &'static Regex {
    JSON_BLOCK_PATTERN.get_or_init(|| Regex::new(r"```(?:json)?\s*\n([\s\S]*?)```").unwrap())
}

/// Extract fenced ```json blocks from markdown content
pub fn extract_json_blocks(content: &str) -> Vec<String> {
    get_json_block_pattern()
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|block| !block.is_empty())
        .collect()
}

/// Find the JSON object in a reply.
///
/// Tries fenced blocks first, then the whole reply, then the outermost
/// `{ ... }` span (models like to wrap JSON in prose).
pub fn extract_json(content: &str) -> Result<serde_json::Value, ParseError> {
    let mut last_error = None;

    let mut candidates = extract_json_blocks(content);
    candidates.push(content.trim().to_string());
    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            candidates.push(content[start..=end].to_string());
        }
    }

    for candidate in candidates {
        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(_) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    match last_error {
        Some(e) if content.contains('{') => Err(ParseError::InvalidJson(e)),
        _ => Err(ParseError::NoJson),
    }
}

/// Shape checks beyond what deserialization enforces
pub trait Validate {
    fn validate(&self) -> Result<(), ParseError>;
}

/// Extract, deserialize and validate a typed reply
pub fn parse_reply<T: DeserializeOwned + Validate>(content: &str) -> Result<T, ParseError> {
    let value = extract_json(content)?;
    let parsed: T =
        serde_json::from_value(value).map_err(|e| ParseError::Schema(e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}
