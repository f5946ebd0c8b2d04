//! Endpoint normalization and route construction.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::error::{BackendError, BackendResult};
use super::types::OwnerType;

static IPV4_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}").ok());

/// Turn a user-entered endpoint into a base URL.
///
/// Returns `None` for an empty endpoint. Explicit `http://`/`https://`
/// endpoints are kept, `localhost` and bare IPv4 hosts get `http://`,
/// everything else gets `https://`.
#[must_use]
pub fn construct_endpoint_url(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(trimmed)
        .map_or_else(|_| trimmed.to_string(), std::borrow::Cow::into_owned);

    let with_scheme = if decoded.starts_with("http://") || decoded.starts_with("https://") {
        decoded
    } else if decoded.starts_with("localhost") || is_ipv4_prefixed(&decoded) {
        format!("http://{decoded}")
    } else {
        format!("https://{decoded}")
    };

    let base = with_scheme.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    Some(base.to_string())
}

fn is_ipv4_prefixed(value: &str) -> bool {
    IPV4_PREFIX
        .as_ref()
        .is_some_and(|regex| regex.is_match(value))
}

fn base_url(endpoint: &str) -> BackendResult<Url> {
    let base = construct_endpoint_url(endpoint)
        .ok_or_else(|| BackendError::InvalidEndpoint("endpoint is empty".to_string()))?;
    Ok(Url::parse(&base)?)
}

fn push_segments(url: &mut Url, segments: &[&str]) -> BackendResult<()> {
    let mut path = url
        .path_segments_mut()
        .map_err(|()| BackendError::InvalidEndpoint("endpoint cannot be a base URL".to_string()))?;
    path.pop_if_empty();
    path.extend(segments);
    Ok(())
}

/// `GET {endpoint}/sessions?type=..&component_id=..&db_id=..`
pub(crate) fn sessions_url(
    endpoint: &str,
    owner_type: OwnerType,
    owner_id: &str,
    db_id: &str,
) -> BackendResult<Url> {
    let mut url = base_url(endpoint)?;
    push_segments(&mut url, &["sessions"])?;
    url.query_pairs_mut()
        .append_pair("type", owner_type.as_str())
        .append_pair("component_id", owner_id)
        .append_pair("db_id", db_id);
    Ok(url)
}

/// `GET {endpoint}/sessions/{session_id}/runs?type=..&db_id=..`
pub(crate) fn session_runs_url(
    endpoint: &str,
    owner_type: OwnerType,
    session_id: &str,
    db_id: &str,
) -> BackendResult<Url> {
    let mut url = base_url(endpoint)?;
    push_segments(&mut url, &["sessions", session_id, "runs"])?;
    url.query_pairs_mut()
        .append_pair("type", owner_type.as_str())
        .append_pair("db_id", db_id);
    Ok(url)
}

/// `POST {endpoint}/metabase/embeds/refresh`
pub(crate) fn embed_refresh_url(endpoint: &str) -> BackendResult<Url> {
    let mut url = base_url(endpoint)?;
    push_segments(&mut url, &["metabase", "embeds", "refresh"])?;
    Ok(url)
}
