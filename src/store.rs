//! Observable chat state shared with the presentation layer.
//!
//! The store owns the transcript, the session list, the sessions-loading
//! flag and the selected backend target. Each value lives in a
//! `tokio::sync::watch` channel so observers can subscribe; transient
//! notifications go through a broadcast channel.

use tokio::sync::{broadcast, watch};

use crate::backend::{BackendTarget, SessionSummary};
use crate::transcript::ChatMessage;

/// Capacity of the notification channel.
const NOTIFICATION_CAPACITY: usize = 32;

/// Severity of a user-visible notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something failed.
    Error,
}

/// Transient message for the user (a toast).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text to display.
    pub message: String,
}

/// Owned chat state with explicit mutation entry points.
#[derive(Debug)]
pub struct ChatStore {
    target: watch::Sender<BackendTarget>,
    messages: watch::Sender<Vec<ChatMessage>>,
    sessions: watch::Sender<Vec<SessionSummary>>,
    sessions_loading: watch::Sender<bool>,
    notifications: broadcast::Sender<Notification>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(BackendTarget::default())
    }
}

impl ChatStore {
    /// Create an empty store pointed at `target`.
    #[must_use]
    pub fn new(target: BackendTarget) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            target: watch::Sender::new(target),
            messages: watch::Sender::new(Vec::new()),
            sessions: watch::Sender::new(Vec::new()),
            sessions_loading: watch::Sender::new(false),
            notifications,
        }
    }

    /// Currently selected endpoint and token.
    #[must_use]
    pub fn target(&self) -> BackendTarget {
        self.target.borrow().clone()
    }

    /// Select another endpoint or token.
    pub fn set_target(&self, target: BackendTarget) {
        self.target.send_replace(target);
    }

    /// Snapshot of the transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    /// Replace the whole transcript at once.
    pub fn replace_messages(&self, messages: Vec<ChatMessage>) {
        tracing::debug!(messages = messages.len(), "Replacing transcript");
        self.messages.send_replace(messages);
    }

    /// Observe transcript replacements.
    #[must_use]
    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    /// Snapshot of the session list.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions.borrow().clone()
    }

    /// Replace the session list.
    pub fn set_sessions(&self, sessions: Vec<SessionSummary>) {
        self.sessions.send_replace(sessions);
    }

    /// Observe session list changes.
    #[must_use]
    pub fn subscribe_sessions(&self) -> watch::Receiver<Vec<SessionSummary>> {
        self.sessions.subscribe()
    }

    /// Whether a session list fetch is running.
    #[must_use]
    pub fn is_sessions_loading(&self) -> bool {
        *self.sessions_loading.borrow()
    }

    /// Set the sessions-loading flag.
    pub fn set_sessions_loading(&self, loading: bool) {
        self.sessions_loading.send_replace(loading);
    }

    /// Raise the sessions-loading flag until the guard is dropped.
    #[must_use]
    pub fn sessions_loading_guard(&self) -> SessionsLoadingGuard<'_> {
        self.set_sessions_loading(true);
        SessionsLoadingGuard { store: self }
    }

    /// Publish a notification. Dropped silently when nobody listens.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
        };
        if self.notifications.send(notification).is_err() {
            tracing::debug!("No notification subscribers");
        }
    }

    /// Shortcut for an error notification.
    pub fn notify_error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }

    /// Receive future notifications.
    #[must_use]
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}

/// Clears the sessions-loading flag on drop.
#[derive(Debug)]
pub struct SessionsLoadingGuard<'a> {
    store: &'a ChatStore,
}

impl Drop for SessionsLoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_sessions_loading(false);
    }
}
