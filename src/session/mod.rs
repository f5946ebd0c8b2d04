//! Session loading.

pub mod error;
pub mod loader;

pub use error::{ListError, LoadError};
pub use loader::{LoaderArgs, SESSIONS_ERROR_MESSAGE, SessionLoader};
