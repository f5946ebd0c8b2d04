//! Tool-call collection.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::{
    Run, ToolCall, ToolMetrics, ToolRole, default_on_error, lenient_optional_timestamp,
};

/// Loose shape shared by direct tool records and tool reasoning messages.
///
/// Every field is optional; a field with the wrong type falls back to its
/// default instead of rejecting the record.
#[derive(Debug, Deserialize)]
struct ToolRecord {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default, deserialize_with = "default_on_error")]
    tool_call_id: Option<String>,
    #[serde(default, deserialize_with = "default_on_error")]
    tool_name: Option<String>,
    #[serde(default, deserialize_with = "default_on_error")]
    tool_args: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "default_on_error")]
    tool_call_error: Option<bool>,
    #[serde(default, deserialize_with = "default_on_error")]
    metrics: Option<ToolMetrics>,
    #[serde(default, deserialize_with = "lenient_optional_timestamp")]
    created_at: Option<i64>,
}

impl ToolRecord {
    /// Apply defaults. A missing `created_at` becomes `now`, which places the
    /// call at reconstruction time rather than at its run's time.
    fn into_tool_call(self, now: i64) -> ToolCall {
        let content = match self.content.or(self.result) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };

        ToolCall {
            role: ToolRole::Tool,
            content,
            tool_call_id: self.tool_call_id.unwrap_or_default(),
            tool_name: self.tool_name.unwrap_or_default(),
            tool_args: self.tool_args.unwrap_or_default(),
            tool_call_error: self.tool_call_error.unwrap_or(false),
            metrics: self.metrics.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

fn normalize_tool(value: &Value, now: i64) -> Option<ToolCall> {
    if !value.is_object() {
        tracing::debug!("Dropping non-object tool call");
        return None;
    }
    match ToolRecord::deserialize(value) {
        Ok(record) => Some(record.into_tool_call(now)),
        Err(err) => {
            tracing::debug!(%err, "Dropping malformed tool call");
            None
        }
    }
}

fn is_tool_message(value: &Value) -> bool {
    value.get("role").and_then(Value::as_str) == Some("tool")
}

/// Tool calls of a run: direct `tools` first, then the `tool` entries of
/// `extra_data.reasoning_messages`.
///
/// Returns `None` when the run invoked no tools.
#[must_use]
pub fn collect_tool_calls(run: &Run, now: i64) -> Option<Vec<ToolCall>> {
    let direct = run.direct_tools().iter();
    let reasoning = run.reasoning_messages().iter().filter(|msg| is_tool_message(msg));

    let calls: Vec<ToolCall> = direct
        .chain(reasoning)
        .filter_map(|value| normalize_tool(value, now))
        .collect();

    (!calls.is_empty()).then_some(calls)
}
