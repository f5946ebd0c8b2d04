//! Error types for session loading.

use thiserror::Error;

use crate::backend::BackendError;

/// Loading one session's transcript failed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required identifier is not selected.
    #[error("cannot load session: no {0} selected")]
    MissingContext(&'static str),

    /// The backend call failed.
    #[error("session fetch failed: {0}")]
    Backend(#[from] BackendError),

    /// The backend answered with something other than a run list.
    #[error("session response is not a list of runs")]
    NotASequence,
}

/// Loading the session list failed.
#[derive(Debug, Error)]
pub enum ListError {
    /// A required identifier is not selected.
    #[error("cannot list sessions: no {0} selected")]
    MissingContext(&'static str),

    /// The backend call failed.
    #[error("session list fetch failed: {0}")]
    Backend(#[from] BackendError),
}
