//! Binary entrypoint that dumps a chat session transcript.

use std::process::ExitCode;

use agent_chat_core::bootstrap;

/// Print the configured session's transcript, or the session list, as JSON.
fn main() -> ExitCode {
    bootstrap::run()
}
