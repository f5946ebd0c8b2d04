//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendTarget, OwnerType, construct_endpoint_url};

/// Prefix shared by every environment variable read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "AGENT_CHAT_";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// Values are individually valid but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the chat core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Selected endpoint, as entered by the user.
    pub endpoint: String,
    /// Bearer token for the backend.
    pub auth_token: Option<String>,
    /// Whether the selected component is an agent or a team.
    pub owner_type: Option<OwnerType>,
    /// Selected agent id.
    pub agent_id: Option<String>,
    /// Selected team id.
    pub team_id: Option<String>,
    /// Database id of the selected component.
    pub db_id: Option<String>,
    /// Session to load, if any.
    pub session_id: Option<String>,
    /// Embed refresh settings.
    pub refresh: RefreshConfig,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7777".to_string(),
            auth_token: None,
            owner_type: None,
            agent_id: None,
            team_id: None,
            db_id: None,
            session_id: None,
            refresh: RefreshConfig::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Select an agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.owner_type = Some(OwnerType::Agent);
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Select a team.
    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.owner_type = Some(OwnerType::Team);
        self.team_id = Some(team_id.into());
        self
    }

    /// Set the database id.
    #[must_use]
    pub fn with_db_id(mut self, db_id: impl Into<String>) -> Self {
        self.db_id = Some(db_id.into());
        self
    }

    /// Set the session to load.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the embed refresh settings.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    /// Backend target derived from endpoint and token.
    #[must_use]
    pub fn target(&self) -> BackendTarget {
        BackendTarget {
            endpoint: self.endpoint.clone(),
            auth_token: self.auth_token.clone(),
        }
    }

    /// Load configuration from `AGENT_CHAT_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(endpoint) = get("ENDPOINT") {
            config.endpoint = endpoint;
        }
        config.auth_token = get("AUTH_TOKEN");
        config.agent_id = get("AGENT_ID");
        config.team_id = get("TEAM_ID");
        config.db_id = get("DB_ID");
        config.session_id = get("SESSION_ID");

        config.owner_type = match get("OWNER_TYPE") {
            Some(raw) => Some(raw.parse().map_err(|value| ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}OWNER_TYPE"),
                value,
            })?),
            None if config.agent_id.is_some() => Some(OwnerType::Agent),
            None if config.team_id.is_some() => Some(OwnerType::Team),
            None => None,
        };

        if let Some(secs) = parse_secs(get("REFRESH_SKEW_SECONDS"), "REFRESH_SKEW_SECONDS")? {
            config.refresh.skew_seconds = i64::try_from(secs).map_err(|_| ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}REFRESH_SKEW_SECONDS"),
                value: secs.to_string(),
            })?;
        }
        if let Some(secs) = parse_secs(get("REFRESH_POLL_SECONDS"), "REFRESH_POLL_SECONDS")? {
            config.refresh.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(get("REQUEST_TIMEOUT_SECONDS"), "REQUEST_TIMEOUT_SECONDS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if construct_endpoint_url(&self.endpoint).is_none() {
            return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
        }
        if self.refresh.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "refresh.poll_interval must be > 0".to_string(),
            ));
        }
        if self.refresh.skew_seconds < 0 {
            return Err(ConfigError::Invalid(
                "refresh.skew_seconds must be >= 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(raw: Option<String>, name: &str) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{name}"),
            value,
        })
    })
    .transpose()
}

/// Timing of the embed credential refresher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh once `now >= expires_at - skew_seconds`.
    pub skew_seconds: i64,
    /// Interval between expiry checks.
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            skew_seconds: 30,
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.refresh.skew_seconds, 30);
        assert_eq!(config.refresh.poll_interval, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new()
            .with_endpoint("os.example.com")
            .with_auth_token("secret")
            .with_team("team-1")
            .with_db_id("db")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.owner_type, Some(OwnerType::Team));
        assert_eq!(config.team_id.as_deref(), Some("team-1"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.target().bearer(), Some("secret"));
    }

    #[test]
    fn test_from_lookup_reads_prefixed_variables() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("AGENT_CHAT_ENDPOINT", "localhost:8000"),
            ("AGENT_CHAT_AGENT_ID", "research"),
            ("AGENT_CHAT_DB_ID", "pg"),
            ("AGENT_CHAT_REFRESH_POLL_SECONDS", "5"),
            ("AGENT_CHAT_AUTH_TOKEN", "  "),
        ]));
        let config = config.unwrap_or_default();

        assert_eq!(config.endpoint, "localhost:8000");
        assert_eq!(config.owner_type, Some(OwnerType::Agent));
        assert_eq!(config.db_id.as_deref(), Some("pg"));
        assert_eq!(config.refresh.poll_interval, Duration::from_secs(5));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = ClientConfig::from_lookup(lookup_from(&[(
            "AGENT_CHAT_REFRESH_SKEW_SECONDS",
            "soon",
        )]));
        assert_eq!(
            result.err(),
            Some(ConfigError::InvalidValue {
                key: "AGENT_CHAT_REFRESH_SKEW_SECONDS".to_string(),
                value: "soon".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_poll() {
        let config = ClientConfig::default().with_refresh(RefreshConfig {
            skew_seconds: 30,
            poll_interval: Duration::ZERO,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_roundtrip_in_seconds() {
        let json = serde_json::to_value(RefreshConfig::default()).unwrap_or_default();
        assert_eq!(json["poll_interval"], serde_json::json!(15));
    }
}
