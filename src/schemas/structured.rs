//! Parsing of JSON payloads out of free-form completion text.
//!
//! Completions often wrap JSON in markdown fences or surround it with prose.
//! Everything that turns completion text into typed values goes through here,
//! and every caller decides its own fallback on error.

use crate::{
    error::{PlannerError, Result},
    schemas::{validate_structured_payload, CompletionSchema},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How strictly a completion payload is checked before deserializing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Deserialize with serde only
    #[default]
    SerdeFirst,
    /// Validate against the envelope's JSON schema first
    Strict,
}

/// Top-level kind of JSON value an envelope expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    /// Read the top-level `type` of a JSON schema
    pub fn of_schema(schema: &Value) -> Option<Self> {
        match schema.get("type").and_then(Value::as_str) {
            Some("object") => Some(Self::Object),
            Some("array") => Some(Self::Array),
            _ => None,
        }
    }

    fn brackets(self) -> (char, char) {
        match self {
            Self::Object => ('{', '}'),
            Self::Array => ('[', ']'),
        }
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    for opener in ["```json", "```JSON", "```"] {
        if let Some(start) = trimmed.find(opener) {
            let body = &trimmed[start + opener.len()..];
            return match body.find("```") {
                Some(end) => body[..end].trim(),
                None => body.trim(),
            };
        }
    }

    trimmed
}

/// Locate the outermost JSON object or array in `text` and parse it
pub fn extract_json(text: &str) -> Result<Value> {
    extract_json_shaped(text, None)
}

/// Like [`extract_json`], but looks for the bracket of `shape` first so prose
/// mentioning `[...]` does not hide the `{...}` envelope (and the reverse)
pub fn extract_json_shaped(text: &str, shape: Option<JsonShape>) -> Result<Value> {
    let body = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    let start = shape
        .and_then(|shape| body.find(shape.brackets().0))
        .or_else(|| body.find(['{', '[']))
        .ok_or_else(|| PlannerError::Validation("Completion contains no JSON".to_string()))?;
    let closer = if body[start..].starts_with('{') { '}' } else { ']' };
    let end = body
        .rfind(closer)
        .filter(|end| *end > start)
        .ok_or_else(|| PlannerError::Validation("Completion JSON is truncated".to_string()))?;

    Ok(serde_json::from_str(&body[start..=end])?)
}

/// Deserialize a JSON value, naming the failing path on error
pub fn deserialize_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        PlannerError::Validation(format!(
            "failed to deserialize completion at {}: {}",
            location,
            err.inner()
        ))
    })
}

/// Parse completion text into `T`
pub fn parse_structured<T: CompletionSchema>(text: &str, mode: ParseMode) -> Result<T> {
    let value = extract_json_shaped(text, JsonShape::of_schema(T::schema().schema_json()))?;

    if mode == ParseMode::Strict {
        validate_structured_payload(T::schema(), &value)?;
    }

    deserialize_value(value)
}

/// Parse completion text into `T`, returning `fallback` on any failure
pub fn parse_or<T: CompletionSchema>(text: &str, mode: ParseMode, fallback: T) -> T {
    match parse_structured(text, mode) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(
                target: "trip_planner::schemas",
                schema = T::schema().schema_name(),
                error = %err,
                "Falling back after unparseable completion"
            );
            fallback
        }
    }
}
