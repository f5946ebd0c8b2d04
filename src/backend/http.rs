//! `reqwest` implementation of [`Backend`].

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;

use super::endpoint::{embed_refresh_url, session_runs_url, sessions_url};
use super::error::{BackendError, BackendResult};
use super::types::{
    BackendTarget, EmbedCredential, EmbedRefreshRequest, SessionListQuery, SessionPage,
    SessionQuery, SessionSummary,
};
use super::{Backend, BackendFuture};

/// HTTP client for the agent platform's history routes.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend client using the timeouts from `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn authorize(request: RequestBuilder, target: &BackendTarget) -> RequestBuilder {
        match target.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(error_detail(&body, status)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_detail(&body, status),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Pull a readable message out of an error body (`{"detail": ..}` or raw text).
fn error_detail(body: &str, status: StatusCode) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["detail", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });

    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

impl Backend for HttpBackend {
    fn fetch_all_sessions<'a>(
        &'a self,
        target: &'a BackendTarget,
        query: &'a SessionListQuery,
    ) -> BackendFuture<'a, BackendResult<Vec<SessionSummary>>> {
        Box::pin(async move {
            let url = sessions_url(&target.endpoint, query.owner_type, &query.owner_id, &query.db_id)?;
            tracing::debug!(%url, "Fetching session list");
            let request = Self::authorize(self.client.get(url), target);
            let page: SessionPage = Self::send_json(request).await?;
            Ok(page.data.unwrap_or_default())
        })
    }

    fn fetch_session<'a>(
        &'a self,
        target: &'a BackendTarget,
        query: &'a SessionQuery,
    ) -> BackendFuture<'a, BackendResult<Value>> {
        Box::pin(async move {
            let url = session_runs_url(
                &target.endpoint,
                query.owner_type,
                &query.session_id,
                &query.db_id,
            )?;
            tracing::debug!(%url, "Fetching session runs");
            let request = Self::authorize(self.client.get(url), target);
            Self::send_json(request).await
        })
    }

    fn refresh_embed_credential<'a>(
        &'a self,
        target: &'a BackendTarget,
        request: &'a EmbedRefreshRequest,
    ) -> BackendFuture<'a, BackendResult<EmbedCredential>> {
        Box::pin(async move {
            let url = embed_refresh_url(&target.endpoint)?;
            tracing::debug!(%url, question_id = request.question_id, "Refreshing embed credential");
            let builder = Self::authorize(self.client.post(url).json(request), target);
            Self::send_json(builder).await
        })
    }
}
