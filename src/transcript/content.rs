//! Content normalization.
//!
//! Agent output arrives as plain text, as a list of typed parts, or as an
//! arbitrary JSON value. Everything is reduced to a single string before it
//! reaches the transcript.

use serde_json::Value;

/// Raw message content as recorded by the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageContent {
    /// Plain text (also used for absent/null content).
    Text(String),
    /// Structured parts; only `{"type": "text"}` parts contribute.
    Parts(Vec<Value>),
    /// Any other JSON value, rendered as a fenced JSON block.
    Structured(Value),
}

impl MessageContent {
    /// Classify a raw JSON value.
    #[must_use]
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Text(String::new()),
            Some(Value::String(text)) => Self::Text(text),
            Some(Value::Array(parts)) => Self::Parts(parts),
            Some(other) => Self::Structured(other),
        }
    }

    /// Reduce to display text.
    #[must_use]
    pub fn normalize(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => join_text_parts(&parts),
            Self::Structured(value) => json_markdown(&value),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Normalize a raw JSON content value in one step.
#[must_use]
pub fn normalize_content(value: Option<Value>) -> String {
    MessageContent::from_value(value).normalize()
}

fn join_text_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
        .map(|part| part.get("text").and_then(Value::as_str).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON value as a fenced markdown code block.
#[must_use]
pub fn json_markdown(value: &Value) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => format!("```json\n{pretty}\n```"),
        Err(_) => format!("```\n{value}\n```"),
    }
}
