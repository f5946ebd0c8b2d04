//! Wall-clock source in epoch seconds.

use std::sync::Arc;

use chrono::Utc;

/// Shared clock returning the current time in epoch seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Clock backed by the system time.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp())
}

/// Clock frozen at `now`.
#[must_use]
pub fn fixed_clock(now: i64) -> Clock {
    Arc::new(move || now)
}
