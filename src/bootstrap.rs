//! Startup helpers for the `chat-transcript` binary.
//!
//! Loads configuration from the environment and dumps either the selected
//! session's reconstructed transcript or the session list as JSON on stdout.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::backend::HttpBackend;
use crate::config::ClientConfig;
use crate::session::{LoaderArgs, SessionLoader};
use crate::store::ChatStore;

/// Run the one-shot dump.
///
/// # Returns
/// `ExitCode::SUCCESS` when the dump was written, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();

    tracing::info!("Starting chat-transcript v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e:#}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(dump(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Read and validate `AGENT_CHAT_*` configuration.
///
/// # Errors
/// Returns an error if a variable is malformed or a setting out of range.
pub fn load_config() -> anyhow::Result<ClientConfig> {
    let config = ClientConfig::from_env().context("reading AGENT_CHAT_* variables")?;
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// Load the configured session (or the session list) and print it as JSON.
///
/// # Errors
/// Returns an error if the backend call fails or stdout cannot be written.
pub async fn dump(config: &ClientConfig) -> anyhow::Result<()> {
    let backend = Arc::new(HttpBackend::new(config).context("building HTTP client")?);
    let store = Arc::new(ChatStore::new(config.target()));
    let loader = SessionLoader::new(backend, Arc::clone(&store));
    let args = LoaderArgs::from(config);

    let json = if let Some(session_id) = config.session_id.as_deref() {
        let messages = loader
            .try_get_session(&args, session_id)
            .await
            .with_context(|| format!("loading session {session_id}"))?;
        serde_json::to_string_pretty(&messages)?
    } else {
        loader.get_sessions(&args).await.context("listing sessions")?;
        serde_json::to_string_pretty(&store.sessions())?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("writing to stdout")?;
    Ok(())
}
