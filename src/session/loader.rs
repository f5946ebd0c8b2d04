//! Session loading: fetches history from the backend and feeds the store.

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{Backend, OwnerType, SessionListQuery, SessionQuery};
use crate::clock::{Clock, system_clock};
use crate::config::ClientConfig;
use crate::store::ChatStore;
use crate::transcript::{ChatMessage, reconstruct_transcript};

use super::error::{ListError, LoadError};

/// Message shown when the session list cannot be fetched.
pub const SESSIONS_ERROR_MESSAGE: &str = "Error loading sessions";

/// Which component's sessions to read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderArgs {
    /// Agent or team; nothing is loaded while unset.
    pub owner_type: Option<OwnerType>,
    /// Selected agent id.
    pub agent_id: Option<String>,
    /// Selected team id.
    pub team_id: Option<String>,
    /// Database id.
    pub db_id: Option<String>,
}

impl LoaderArgs {
    /// Arguments for an agent.
    #[must_use]
    pub fn agent(agent_id: impl Into<String>, db_id: impl Into<String>) -> Self {
        Self {
            owner_type: Some(OwnerType::Agent),
            agent_id: Some(agent_id.into()),
            team_id: None,
            db_id: Some(db_id.into()),
        }
    }

    /// Arguments for a team.
    #[must_use]
    pub fn team(team_id: impl Into<String>, db_id: impl Into<String>) -> Self {
        Self {
            owner_type: Some(OwnerType::Team),
            agent_id: None,
            team_id: Some(team_id.into()),
            db_id: Some(db_id.into()),
        }
    }

    /// Agent id or team id, depending on the owner type.
    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        let id = match self.owner_type? {
            OwnerType::Agent => self.agent_id.as_deref(),
            OwnerType::Team => self.team_id.as_deref(),
        };
        id.filter(|id| !id.trim().is_empty())
    }

    fn resolve(&self) -> Result<(OwnerType, &str, &str), &'static str> {
        let owner_type = self.owner_type.ok_or("owner type")?;
        let owner_id = self.selected_id().ok_or(match owner_type {
            OwnerType::Agent => "agent",
            OwnerType::Team => "team",
        })?;
        let db_id = self
            .db_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or("database")?;
        Ok((owner_type, owner_id, db_id))
    }
}

impl From<&ClientConfig> for LoaderArgs {
    fn from(config: &ClientConfig) -> Self {
        Self {
            owner_type: config.owner_type,
            agent_id: config.agent_id.clone(),
            team_id: config.team_id.clone(),
            db_id: config.db_id.clone(),
        }
    }
}

/// Loads session transcripts and session lists into a [`ChatStore`].
pub struct SessionLoader<B: ?Sized> {
    backend: Arc<B>,
    store: Arc<ChatStore>,
    clock: Clock,
}

impl<B: Backend + ?Sized> SessionLoader<B> {
    /// Create a loader writing into `store`.
    #[must_use]
    pub fn new(backend: Arc<B>, store: Arc<ChatStore>) -> Self {
        Self {
            backend,
            store,
            clock: system_clock(),
        }
    }

    /// Replace the clock used for undated tool calls.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The store this loader writes into.
    #[must_use]
    pub const fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    /// Fetch a session and replace the transcript with its reconstruction.
    ///
    /// On any error the store keeps its previous transcript.
    ///
    /// # Errors
    /// Returns an error if context is missing, the backend call fails, or
    /// the response is not a run list.
    pub async fn try_get_session(
        &self,
        args: &LoaderArgs,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, LoadError> {
        let target = self.store.target();
        if target.endpoint_url().is_none() {
            return Err(LoadError::MissingContext("endpoint"));
        }
        if session_id.trim().is_empty() {
            return Err(LoadError::MissingContext("session"));
        }
        let (owner_type, _, db_id) = args.resolve().map_err(LoadError::MissingContext)?;

        let query = SessionQuery {
            owner_type,
            session_id: session_id.to_string(),
            db_id: db_id.to_string(),
        };
        let response = self.backend.fetch_session(&target, &query).await?;

        let Value::Array(runs) = response else {
            return Err(LoadError::NotASequence);
        };

        let messages = reconstruct_transcript(&runs, (self.clock)());
        tracing::info!(
            session_id,
            runs = runs.len(),
            messages = messages.len(),
            "Session transcript loaded"
        );

        self.store.replace_messages(messages.clone());
        Ok(messages)
    }

    /// Like [`Self::try_get_session`], but reports failure as `None`.
    pub async fn get_session(&self, args: &LoaderArgs, session_id: &str) -> Option<Vec<ChatMessage>> {
        match self.try_get_session(args, session_id).await {
            Ok(messages) => Some(messages),
            Err(LoadError::MissingContext(what)) => {
                tracing::debug!(what, "Skipping session load");
                None
            }
            Err(err) => {
                tracing::warn!(%err, session_id, "Failed to load session");
                None
            }
        }
    }

    /// Fetch the session list of the selected agent or team into the store.
    ///
    /// While the request runs the store's loading flag is raised; it is
    /// cleared on every exit path. On backend failure the list is reset to
    /// empty and an error notification is published.
    ///
    /// # Errors
    /// Returns an error if context is missing or the backend call fails.
    pub async fn get_sessions(&self, args: &LoaderArgs) -> Result<usize, ListError> {
        let target = self.store.target();
        if target.endpoint_url().is_none() {
            return Err(ListError::MissingContext("endpoint"));
        }
        let (owner_type, owner_id, db_id) = args.resolve().map_err(ListError::MissingContext)?;

        let query = SessionListQuery {
            owner_type,
            owner_id: owner_id.to_string(),
            db_id: db_id.to_string(),
        };

        let _loading = self.store.sessions_loading_guard();
        match self.backend.fetch_all_sessions(&target, &query).await {
            Ok(sessions) => {
                let count = sessions.len();
                tracing::debug!(count, owner = %owner_type, owner_id, "Session list loaded");
                self.store.set_sessions(sessions);
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(%err, owner_id, "Failed to load sessions");
                self.store.notify_error(SESSIONS_ERROR_MESSAGE);
                self.store.set_sessions(Vec::new());
                Err(err.into())
            }
        }
    }
}
