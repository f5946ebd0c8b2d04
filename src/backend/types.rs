//! Request and response types exchanged with the history backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::endpoint::construct_endpoint_url;

/// Kind of component that owns a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    /// A single agent.
    Agent,
    /// A team of agents.
    Team,
}

impl OwnerType {
    /// Stable string form used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Team => "team",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "team" => Ok(Self::Team),
            _ => Err(value.to_string()),
        }
    }
}

/// Where to send requests and which credentials to present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendTarget {
    /// Endpoint as entered by the user (normalized on use).
    pub endpoint: String,
    /// Bearer token, if any.
    pub auth_token: Option<String>,
}

impl BackendTarget {
    /// Create a target for an endpoint without credentials.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
        }
    }

    /// Attach a bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Normalized base URL, or `None` when no endpoint is selected.
    #[must_use]
    pub fn endpoint_url(&self) -> Option<String> {
        construct_endpoint_url(&self.endpoint)
    }

    /// Token to send, ignoring blank values.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Parameters for listing the sessions of one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionListQuery {
    /// Agent or team.
    pub owner_type: OwnerType,
    /// Agent id or team id.
    pub owner_id: String,
    /// Database the sessions live in.
    pub db_id: String,
}

/// Parameters for fetching one session's runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionQuery {
    /// Agent or team.
    pub owner_type: OwnerType,
    /// Session to fetch.
    pub session_id: String,
    /// Database the session lives in.
    pub db_id: String,
}

/// One entry of the session list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: String,
    /// Human readable name.
    #[serde(default)]
    pub session_name: String,
    /// Creation time (epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last update time (epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Envelope returned by the session list route.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionPage {
    #[serde(default)]
    pub data: Option<Vec<SessionSummary>>,
}

/// Body of an embed credential refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRefreshRequest {
    /// Question to sign a new URL for.
    pub question_id: i64,
    /// Title shown with the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Fresh signed URL for an embed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedCredential {
    /// Signed, time-limited iframe URL.
    pub iframe_url: String,
    /// Expiry in epoch seconds.
    pub expires_at: i64,
}
