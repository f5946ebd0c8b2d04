//! Session transcript reconstruction.
//!
//! Converts the backend's run-oriented history into the canonical, ordered
//! chat-message timeline:
//! - `types`: run records, chat messages and tool calls
//! - `content`: reduction of heterogeneous content to text
//! - `tools`: tool-call collection from direct and reasoning records
//! - `embeds`: embed validation and identity merge
//! - `reconstruct`: run expansion into user/agent message pairs

pub mod content;
pub mod embeds;
pub mod reconstruct;
pub mod tools;
pub mod types;

pub use content::{MessageContent, json_markdown, normalize_content};
pub use embeds::{
    EmbedKey, EmbedKind, MetabaseEmbedData, merge_embeds, parse_embeds, resolve_run_embeds,
};
pub use reconstruct::{expand_run, reconstruct_transcript};
pub use tools::collect_tool_calls;
pub use types::{ChatMessage, Role, Run, ToolCall, ToolMetrics, ToolRole};
