//! Error type for embed credential refreshes.

use thiserror::Error;

use crate::backend::BackendError;

/// An embed credential refresh failed.
///
/// Failures stay local to the embed: the previous URL keeps being shown and
/// the message is recorded next to it.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No backend endpoint is selected.
    #[error("no endpoint selected")]
    NoEndpoint,

    /// The backend rejected or failed the request.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
