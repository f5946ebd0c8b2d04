//! Run-to-message expansion.

use serde_json::Value;

use super::content::normalize_content;
use super::embeds::resolve_run_embeds;
use super::tools::collect_tool_calls;
use super::types::{ChatMessage, Run};

/// Expand one run into its user message followed by its agent message.
#[must_use]
pub fn expand_run(run: Run, now: i64) -> [ChatMessage; 2] {
    let tool_calls = collect_tool_calls(&run, now);
    let embeds = resolve_run_embeds(&run);

    let mut extra_data = run.extra_data.unwrap_or_default();
    if !embeds.is_empty() {
        let resolved = embeds
            .iter()
            .filter_map(|embed| serde_json::to_value(embed).ok())
            .collect();
        extra_data.insert("embeds".to_string(), Value::Array(resolved));
    }

    let user = ChatMessage::user(normalize_content(run.run_input), run.created_at);

    let agent = ChatMessage {
        tool_calls,
        extra_data: Some(extra_data),
        images: run.images,
        videos: run.videos,
        audio: run.audio,
        response_audio: run.response_audio,
        ..ChatMessage::agent(normalize_content(run.content), run.created_at)
    };

    [user, agent]
}

/// Build the canonical transcript of a session from its raw runs.
///
/// Produces exactly two messages per run, in run order. `now` stands in for
/// tool calls that carry no timestamp.
#[must_use]
pub fn reconstruct_transcript(runs: &[Value], now: i64) -> Vec<ChatMessage> {
    runs.iter()
        .map(Run::from_value)
        .flat_map(|run| expand_run(run, now))
        .collect()
}
