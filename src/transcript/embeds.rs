//! Visualization embeds attached to agent messages.
//!
//! A run may carry embeds in three places (`extra_data.embeds`,
//! `metadata.embeds`, `session_state.metabase_embeds`). Each list is
//! validated element by element and the three are merged by identity,
//! later sources overriding earlier ones.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Run, default_on_error};

/// Discriminant of an embed record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EmbedKind {
    /// A saved Metabase question.
    #[serde(rename = "metabase_question")]
    MetabaseQuestion,
}

impl EmbedKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MetabaseQuestion => "metabase_question",
        }
    }
}

/// A signed, time-limited visualization reference.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MetabaseEmbedData {
    /// Always `metabase_question`.
    pub kind: EmbedKind,
    /// Question identifier.
    pub question_id: i64,
    /// Optional display title.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "default_on_error"
    )]
    pub title: Option<String>,
    /// Signed iframe URL; expires at `expires_at`.
    pub iframe_url: String,
    /// Stable deep link into Metabase.
    pub open_url: String,
    /// Expiry of `iframe_url` in epoch seconds.
    pub expires_at: i64,
}

impl MetabaseEmbedData {
    /// Identity of this embed; equal keys denote the same logical embed.
    #[must_use]
    pub const fn key(&self) -> EmbedKey {
        EmbedKey {
            kind: self.kind,
            question_id: self.question_id,
        }
    }

    /// Trimmed title, or a generic label when none is set.
    #[must_use]
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map_or_else(
                || format!("Metabase Question {}", self.question_id),
                str::to_string,
            )
    }

    /// Validate one raw element.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

/// Identity key `(kind, question_id)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EmbedKey {
    /// Embed kind.
    pub kind: EmbedKind,
    /// Question identifier.
    pub question_id: i64,
}

impl fmt::Display for EmbedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.question_id)
    }
}

/// Keep the structurally valid embeds of a candidate list.
///
/// Anything that is not an array yields an empty list.
#[must_use]
pub fn parse_embeds(value: Option<&Value>) -> Vec<MetabaseEmbedData> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let parsed = MetabaseEmbedData::from_value(item);
            if parsed.is_none() {
                tracing::debug!(embed = %item, "Dropping malformed embed");
            }
            parsed
        })
        .collect()
}

/// Merge two embed lists by identity.
///
/// An incoming embed replaces an existing one with the same key but keeps
/// its position; new keys are appended.
#[must_use]
pub fn merge_embeds(
    existing: Vec<MetabaseEmbedData>,
    incoming: Vec<MetabaseEmbedData>,
) -> Vec<MetabaseEmbedData> {
    let mut merged: Vec<MetabaseEmbedData> = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions: HashMap<EmbedKey, usize> = HashMap::new();

    for embed in existing.into_iter().chain(incoming) {
        match positions.get(&embed.key()) {
            Some(&index) => merged[index] = embed,
            None => {
                positions.insert(embed.key(), merged.len());
                merged.push(embed);
            }
        }
    }

    merged
}

/// Resolve the embed set of a run: `extra_data`, then `metadata`, then
/// `session_state`.
#[must_use]
pub fn resolve_run_embeds(run: &Run) -> Vec<MetabaseEmbedData> {
    let [from_extra, from_metadata, from_state] = run.embed_sources().map(parse_embeds);
    merge_embeds(merge_embeds(from_extra, from_metadata), from_state)
}
