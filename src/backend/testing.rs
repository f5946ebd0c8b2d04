//! Scripted in-memory backend for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::Notify;

use super::error::{BackendError, BackendResult};
use super::types::{
    BackendTarget, EmbedCredential, EmbedRefreshRequest, SessionListQuery, SessionQuery,
    SessionSummary,
};
use super::{Backend, BackendFuture};

fn failure(message: &str) -> BackendError {
    BackendError::Status {
        status: 500,
        message: message.to_string(),
    }
}

/// Backend returning canned responses and counting calls.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    sessions: Mutex<Option<Result<Vec<SessionSummary>, String>>>,
    runs: Mutex<Option<Result<Value, String>>>,
    credentials: Mutex<VecDeque<Result<EmbedCredential, String>>>,
    gate: Option<Arc<Notify>>,
    pub list_calls: AtomicUsize,
    pub session_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub last_refresh: Mutex<Option<EmbedRefreshRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold every refresh until the gate is notified.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn with_sessions(self, sessions: Result<Vec<SessionSummary>, &str>) -> Self {
        *self.sessions.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(sessions.map_err(str::to_string));
        self
    }

    pub(crate) fn with_runs(self, runs: Result<Value, &str>) -> Self {
        *self.runs.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(runs.map_err(str::to_string));
        self
    }

    pub(crate) fn push_credential(&self, credential: Result<EmbedCredential, &str>) {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(credential.map_err(str::to_string));
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Backend for ScriptedBackend {
    fn fetch_all_sessions<'a>(
        &'a self,
        _target: &'a BackendTarget,
        _query: &'a SessionListQuery,
    ) -> BackendFuture<'a, BackendResult<Vec<SessionSummary>>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match scripted {
                Some(Ok(sessions)) => Ok(sessions),
                Some(Err(message)) => Err(failure(&message)),
                None => Ok(Vec::new()),
            }
        })
    }

    fn fetch_session<'a>(
        &'a self,
        _target: &'a BackendTarget,
        _query: &'a SessionQuery,
    ) -> BackendFuture<'a, BackendResult<Value>> {
        Box::pin(async move {
            self.session_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .runs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match scripted {
                Some(Ok(runs)) => Ok(runs),
                Some(Err(message)) => Err(failure(&message)),
                None => Ok(Value::Array(Vec::new())),
            }
        })
    }

    fn refresh_embed_credential<'a>(
        &'a self,
        _target: &'a BackendTarget,
        request: &'a EmbedRefreshRequest,
    ) -> BackendFuture<'a, BackendResult<EmbedCredential>> {
        Box::pin(async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_refresh.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(request.clone());

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let next = self
                .credentials
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match next {
                Some(Ok(credential)) => Ok(credential),
                Some(Err(message)) => Err(failure(&message)),
                None => Err(failure("no credential scripted")),
            }
        })
    }
}
