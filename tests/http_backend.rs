//! `HttpBackend` against a local stand-in for the history service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use agent_chat_core::backend::{
    Backend, BackendError, BackendTarget, EmbedRefreshRequest, HttpBackend, OwnerType,
    SessionListQuery, SessionQuery,
};
use agent_chat_core::config::ClientConfig;
use agent_chat_core::session::{LoaderArgs, SessionLoader};
use agent_chat_core::store::ChatStore;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Default)]
struct Seen {
    queries: Vec<HashMap<String, String>>,
    authorization: Vec<Option<String>>,
    refresh_bodies: Vec<Value>,
}

type Shared = Arc<Mutex<Seen>>;

fn record(seen: &Shared, headers: &HeaderMap, query: Option<HashMap<String, String>>) {
    let mut seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
    seen.authorization.push(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    if let Some(query) = query {
        seen.queries.push(query);
    }
}

async fn list_sessions(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let component = query.get("component_id").cloned().unwrap_or_default();
    record(&seen, &headers, Some(query));
    match component.as_str() {
        "empty" => (StatusCode::OK, Json(json!({}))),
        "locked" => (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token"}))),
        _ => (
            StatusCode::OK,
            Json(json!({"data": [
                {"session_id": "s-1", "session_name": "Quarterly revenue", "created_at": 1_700_000_000},
                {"session_id": "s-2", "session_name": "Churn"}
            ]})),
        ),
    }
}

async fn session_runs(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    record(&seen, &headers, Some(query));
    if session_id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Session not found"})));
    }
    (
        StatusCode::OK,
        Json(json!([
            {
                "run_input": "Show revenue by month",
                "content": "Here is the chart.",
                "created_at": 1_700_000_100,
                "tools": [{"tool_call_id": "t1", "tool_name": "run_sql", "content": "12 rows", "created_at": 1_700_000_101}],
                "extra_data": {"embeds": [{
                    "kind": "metabase_question", "question_id": 42, "title": "Revenue",
                    "iframe_url": "https://mb.example/embed/a", "open_url": "https://mb.example/question/42",
                    "expires_at": 1_700_000_700
                }]}
            }
        ])),
    )
}

async fn refresh_embed(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&seen, &headers, None);
    let question_id = body["question_id"].as_i64().unwrap_or_default();
    seen.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .refresh_bodies
        .push(body);
    Json(json!({
        "iframe_url": format!("https://mb.example/embed/{question_id}/fresh"),
        "expires_at": 1_700_003_600
    }))
}

async fn serve() -> (String, Shared) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}/runs", get(session_runs))
        .route("/metabase/embeds/refresh", post(refresh_embed))
        .with_state(Arc::clone(&seen));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("127.0.0.1:{}", addr.port()), seen)
}

fn backend() -> HttpBackend {
    HttpBackend::new(&ClientConfig::default()).unwrap()
}

#[tokio::test]
async fn test_list_sessions_with_query_and_bearer() {
    let (endpoint, seen) = serve().await;
    let target = BackendTarget::new(format!("http://{endpoint}/")).with_auth_token("secret");
    let query = SessionListQuery {
        owner_type: OwnerType::Team,
        owner_id: "ops".to_string(),
        db_id: "pg".to_string(),
    };

    let sessions = backend().fetch_all_sessions(&target, &query).await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_name, "Quarterly revenue");
    assert_eq!(sessions[1].created_at, None);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.queries[0].get("type").map(String::as_str), Some("team"));
    assert_eq!(seen.queries[0].get("component_id").map(String::as_str), Some("ops"));
    assert_eq!(seen.queries[0].get("db_id").map(String::as_str), Some("pg"));
    assert_eq!(seen.authorization[0].as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn test_missing_data_is_empty_list() {
    let (endpoint, seen) = serve().await;
    let target = BackendTarget::new(format!("http://{endpoint}")).with_auth_token("  ");
    let query = SessionListQuery {
        owner_type: OwnerType::Agent,
        owner_id: "empty".to_string(),
        db_id: "pg".to_string(),
    };

    let sessions = backend().fetch_all_sessions(&target, &query).await.unwrap();

    assert!(sessions.is_empty());
    assert_eq!(seen.lock().unwrap().authorization[0], None);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let (endpoint, _seen) = serve().await;
    let target = BackendTarget::new(format!("http://{endpoint}"));
    let query = SessionListQuery {
        owner_type: OwnerType::Agent,
        owner_id: "locked".to_string(),
        db_id: "pg".to_string(),
    };

    let err = backend().fetch_all_sessions(&target, &query).await.unwrap_err();

    assert!(matches!(err, BackendError::Auth(ref detail) if detail == "Invalid token"));
}

#[tokio::test]
async fn test_session_runs_and_not_found() {
    let (endpoint, seen) = serve().await;
    let target = BackendTarget::new(format!("http://{endpoint}"));
    let query = SessionQuery {
        owner_type: OwnerType::Agent,
        session_id: "s-1".to_string(),
        db_id: "pg".to_string(),
    };

    let runs = backend().fetch_session(&target, &query).await.unwrap();
    assert_eq!(runs.as_array().map(Vec::len), Some(1));
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.queries[0].get("type").map(String::as_str), Some("agent"));
        assert!(!seen.queries[0].contains_key("component_id"));
    }

    let missing = SessionQuery {
        session_id: "missing".to_string(),
        ..query
    };
    let err = backend().fetch_session(&target, &missing).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Status { status: 404, ref message } if message == "Session not found"
    ));
}

#[tokio::test]
async fn test_refresh_posts_question_and_title() {
    let (endpoint, seen) = serve().await;
    let target = BackendTarget::new(format!("http://{endpoint}")).with_auth_token("secret");
    let request = EmbedRefreshRequest {
        question_id: 42,
        title: Some("Revenue".to_string()),
    };

    let credential = backend()
        .refresh_embed_credential(&target, &request)
        .await
        .unwrap();

    assert_eq!(credential.iframe_url, "https://mb.example/embed/42/fresh");
    assert_eq!(credential.expires_at, 1_700_003_600);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.refresh_bodies[0], json!({"question_id": 42, "title": "Revenue"}));
    assert_eq!(seen.authorization[0].as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn test_loader_reconstructs_over_http() {
    let (endpoint, _seen) = serve().await;
    let store = Arc::new(ChatStore::new(BackendTarget::new(format!("http://{endpoint}"))));
    let loader = SessionLoader::new(Arc::new(backend()), Arc::clone(&store));

    let messages = loader
        .get_session(&LoaderArgs::agent("sales", "pg"), "s-1")
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Show revenue by month");
    let tools = messages[1].tool_calls.clone().unwrap_or_default();
    assert_eq!(tools[0].tool_name, "run_sql");
    assert_eq!(messages[1].embeds()[0].question_id, 42);
    assert_eq!(store.messages(), messages);

    let missing = loader.get_session(&LoaderArgs::agent("sales", "pg"), "missing").await;
    assert!(missing.is_none());
    assert_eq!(store.messages().len(), 2);
}
