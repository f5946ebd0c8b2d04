//! Embed credential scheduling.
//!
//! Signed visualization URLs expire. Each displayed embed gets an
//! [`EmbedRefresher`] that renews its URL shortly before expiry, with at most
//! one request in flight per embed. An [`EmbedDeck`] keeps the refreshers of a
//! message in step with its embed set.

pub mod deck;
pub mod error;
pub mod lock;
pub mod refresher;

pub use deck::EmbedDeck;
pub use error::RefreshError;
pub use lock::{RefreshLock, RefreshPermit};
pub use refresher::{EmbedRefreshHandle, EmbedRefresher, EmbedSnapshot, RefreshOutcome};
