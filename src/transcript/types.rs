//! Run records from the backend and the canonical chat messages built from them.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::embeds::{MetabaseEmbedData, parse_embeds};
use crate::text_direction::{TextDirection, get_text_direction};

/// Deserialize a field, falling back to its default when the value has the
/// wrong shape.
pub(crate) fn default_on_error<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Epoch seconds from an integer or a float (truncated).
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn epoch_seconds(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.trunc() as i64)
    })
}

/// Deserialize a timestamp, accepting floats and defaulting to 0 otherwise.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(epoch_seconds(&value).unwrap_or_default())
}

/// Like [`lenient_timestamp`], but keeps "no usable value" as `None`.
pub(crate) fn lenient_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(epoch_seconds(&value))
}

/// One backend-recorded execution unit.
///
/// Decoding never fails: malformed fields fall back to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Run {
    /// Original user text (usually a string).
    pub run_input: Option<Value>,
    /// Agent output: text, content parts or an arbitrary value.
    pub content: Option<Value>,
    /// Direct tool-call records.
    pub tools: Option<Value>,
    /// Bag holding `reasoning_messages`, `embeds` and friends.
    #[serde(deserialize_with = "default_on_error")]
    pub extra_data: Option<Map<String, Value>>,
    /// Run metadata, possibly holding `embeds`.
    pub metadata: Option<Value>,
    /// Session state snapshot, possibly holding `metabase_embeds`.
    pub session_state: Option<Value>,
    /// Images produced by the run.
    pub images: Option<Value>,
    /// Videos produced by the run.
    pub videos: Option<Value>,
    /// Audio produced by the run.
    pub audio: Option<Value>,
    /// Spoken response, if any.
    pub response_audio: Option<Value>,
    /// Creation time in epoch seconds.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: i64,
}

impl Run {
    /// Decode a raw run, tolerating any shape.
    ///
    /// Anything but a JSON object decodes to an empty run.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_default()
    }

    /// `extra_data.reasoning_messages`, if it is a list.
    #[must_use]
    pub fn reasoning_messages(&self) -> &[Value] {
        self.extra_data
            .as_ref()
            .and_then(|extra| extra.get("reasoning_messages"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The direct `tools` list, if it is a list.
    #[must_use]
    pub fn direct_tools(&self) -> &[Value] {
        self.tools
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Candidate embed lists in merge order:
    /// `extra_data.embeds`, `metadata.embeds`, `session_state.metabase_embeds`.
    #[must_use]
    pub fn embed_sources(&self) -> [Option<&Value>; 3] {
        [
            self.extra_data.as_ref().and_then(|extra| extra.get("embeds")),
            self.metadata.as_ref().and_then(|meta| meta.get("embeds")),
            self.session_state
                .as_ref()
                .and_then(|state| state.get("metabase_embeds")),
        ]
    }
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human side.
    User,
    /// The agent side.
    Agent,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role tag carried by every normalized tool call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRole {
    /// The only accepted value.
    #[default]
    Tool,
}

/// Timing and other metrics of a tool call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetrics {
    /// Execution time in seconds.
    #[serde(default, deserialize_with = "default_on_error")]
    pub time: f64,
    /// Any other metric reported by the backend.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A normalized tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Always `tool`.
    pub role: ToolRole,
    /// Tool output, if any.
    pub content: Option<String>,
    /// Call identifier (empty when unknown).
    pub tool_call_id: String,
    /// Tool name (empty when unknown).
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub tool_args: Map<String, Value>,
    /// Whether the call failed.
    pub tool_call_error: bool,
    /// Metrics, `{time: 0}` when absent.
    pub metrics: ToolMetrics,
    /// Creation time in epoch seconds.
    pub created_at: i64,
}

/// A canonical, display-ready transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Plain text content.
    pub content: String,
    /// Tool calls; absent (not empty) when the run invoked none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Pass-through bag; `embeds` holds the resolved embed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Map<String, Value>>,
    /// Images, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Value>,
    /// Videos, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Value>,
    /// Audio, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Value>,
    /// Spoken response, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_audio: Option<Value>,
    /// Creation time of the source run (epoch seconds).
    pub created_at: i64,
}

impl ChatMessage {
    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>, created_at: i64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            extra_data: None,
            images: None,
            videos: None,
            audio: None,
            response_audio: None,
            created_at,
        }
    }

    /// Build an agent message with no attachments.
    #[must_use]
    pub fn agent(content: impl Into<String>, created_at: i64) -> Self {
        Self {
            role: Role::Agent,
            ..Self::user(content, created_at)
        }
    }

    /// The resolved embeds stored in `extra_data.embeds`.
    #[must_use]
    pub fn embeds(&self) -> Vec<MetabaseEmbedData> {
        parse_embeds(self.extra_data.as_ref().and_then(|extra| extra.get("embeds")))
    }

    /// Text to show first: `content`, else the audio transcript.
    #[must_use]
    pub fn primary_text(&self) -> &str {
        if !self.content.is_empty() {
            return &self.content;
        }
        self.response_audio
            .as_ref()
            .and_then(|audio| audio.get("transcript"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Layout direction of the primary text.
    #[must_use]
    pub fn direction(&self) -> TextDirection {
        get_text_direction(self.primary_text())
    }
}
