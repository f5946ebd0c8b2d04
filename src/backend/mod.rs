//! Client side of the agent platform's history service.
//!
//! This module provides:
//! - The [`Backend`] abstraction consumed by the session loader and the
//!   embed refresher
//! - An HTTP implementation on top of `reqwest`
//! - Endpoint normalization and route construction
//! - Request/response types and errors

pub mod endpoint;
pub mod error;
pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use endpoint::construct_endpoint_url;
pub use error::{BackendError, BackendResult};
pub use http::HttpBackend;
pub use types::{
    BackendTarget, EmbedCredential, EmbedRefreshRequest, OwnerType, SessionListQuery,
    SessionQuery, SessionSummary,
};

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

/// Boxed future type for backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations the chat core needs from the history service.
pub trait Backend: Send + Sync {
    /// List the sessions of an agent or team.
    ///
    /// # Errors
    /// Returns an error on transport or authentication failure.
    fn fetch_all_sessions<'a>(
        &'a self,
        target: &'a BackendTarget,
        query: &'a SessionListQuery,
    ) -> BackendFuture<'a, BackendResult<Vec<SessionSummary>>>;

    /// Fetch the raw run records of one session.
    ///
    /// The payload is returned untyped; callers must check that it is an array.
    ///
    /// # Errors
    /// Returns an error on transport or authentication failure.
    fn fetch_session<'a>(
        &'a self,
        target: &'a BackendTarget,
        query: &'a SessionQuery,
    ) -> BackendFuture<'a, BackendResult<Value>>;

    /// Ask for a freshly signed embed URL.
    ///
    /// # Errors
    /// Returns an error on any transport or validation failure.
    fn refresh_embed_credential<'a>(
        &'a self,
        target: &'a BackendTarget,
        request: &'a EmbedRefreshRequest,
    ) -> BackendFuture<'a, BackendResult<EmbedCredential>>;
}
