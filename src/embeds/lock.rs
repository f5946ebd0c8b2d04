//! Single-flight guard for credential refreshes.

use std::sync::atomic::{AtomicBool, Ordering};

/// At most one holder at a time; a second acquirer is turned away, not queued.
#[derive(Debug, Default)]
pub struct RefreshLock {
    busy: AtomicBool,
}

impl RefreshLock {
    /// Create an unheld lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Atomically take the lock if it is free.
    #[must_use]
    pub fn try_acquire(&self) -> Option<RefreshPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RefreshPermit { lock: self })
    }

    /// Whether a refresh currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the lock on drop, whatever the refresh outcome.
#[must_use = "the lock is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct RefreshPermit<'a> {
    lock: &'a RefreshLock,
}

impl Drop for RefreshPermit<'_> {
    fn drop(&mut self) {
        self.lock.busy.store(false, Ordering::Release);
    }
}
