mod common;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use common::{KeywordEmbedder, ScriptedGenerator};
use docchat_backend::core::config::{AppConfig, AppPaths, ConfigService};
use docchat_backend::core::errors::ApiError;
use docchat_backend::server::handlers::{chat, config, documents, sessions};
use docchat_backend::state::AppState;

struct Harness {
    state: Arc<AppState>,
    generator: Arc<ScriptedGenerator>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_dirs(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let mut app_config = AppConfig::default();
    app_config.retrieval.top_k = 1;
    app_config.generation.api_key = Some("sk-test-secret".to_string());

    let generator = Arc::new(ScriptedGenerator::default());
    let state = AppState::with_components(
        paths.clone(),
        ConfigService::new(paths),
        app_config,
        Arc::new(KeywordEmbedder),
        generator.clone(),
    )
    .unwrap();

    Harness {
        state,
        generator,
        _dir: dir,
    }
}

fn status<T: IntoResponse>(result: Result<T, ApiError>) -> StatusCode {
    match result {
        Ok(response) => response.into_response().status(),
        Err(err) => err.into_response().status(),
    }
}

fn chat_request(message: &str, session_id: Option<&str>) -> chat::ChatRequest {
    serde_json::from_value(serde_json::json!({
        "message": message,
        "session_id": session_id,
        "include_sources": true,
    }))
    .unwrap()
}

async fn upload_leave_policy(state: &Arc<AppState>) -> StatusCode {
    let request: documents::IngestRequest = serde_json::from_value(serde_json::json!({
        "documents": [
            {"name": "A", "content": "Annual leave is 20 days."},
            {"name": "B", "content": "Sick leave is 10 days."}
        ]
    }))
    .unwrap();
    status(documents::ingest_documents(State(state.clone()), Json(request)).await)
}

#[tokio::test]
async fn chat_before_documents_is_still_preparing() {
    let h = harness();
    let result = chat::chat(
        State(h.state.clone()),
        Json(chat_request("How many sick days do I get?", None)),
    )
    .await;
    assert_eq!(status(result), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn upload_then_chat_succeeds_and_persists_index() {
    let h = harness();
    assert_eq!(upload_leave_policy(&h.state).await, StatusCode::OK);
    assert!(h.state.engine.index_exists(&h.state.index_path));

    let result = chat::chat(
        State(h.state.clone()),
        Json(chat_request("How many sick days do I get?", Some("s1"))),
    )
    .await;
    assert_eq!(status(result), StatusCode::OK);

    let session = h.state.sessions.get("s1").await.unwrap();
    assert_eq!(session.lock().await.memory.len(), 2);
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let h = harness();
    let result = chat::chat(State(h.state.clone()), Json(chat_request("   ", None))).await;
    assert_eq!(status(result), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generator_failure_maps_to_bad_gateway() {
    let h = harness();
    upload_leave_policy(&h.state).await;
    h.generator.set_failing(true);

    let result = chat::chat_with_scores(
        State(h.state.clone()),
        Json(chat_request("How many sick days do I get?", Some("s1"))),
    )
    .await;
    assert_eq!(status(result), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn reset_clears_history_and_unknown_history_is_not_found() {
    let h = harness();
    upload_leave_policy(&h.state).await;
    let _ = chat::chat(
        State(h.state.clone()),
        Json(chat_request("How many sick days do I get?", Some("s1"))),
    )
    .await;

    let reset: chat::ResetRequest =
        serde_json::from_value(serde_json::json!({"session_id": "s1"})).unwrap();
    assert_eq!(
        status(chat::reset(State(h.state.clone()), Json(reset)).await),
        StatusCode::OK
    );
    let session = h.state.sessions.get("s1").await.unwrap();
    assert!(session.lock().await.memory.is_empty());

    let missing =
        sessions::get_session_history(State(h.state.clone()), Path("nobody".to_string())).await;
    assert_eq!(status(missing), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn config_endpoint_redacts_api_keys() {
    let h = harness();
    let response = config::get_config(State(h.state.clone()))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let rendered = serde_json::to_value(h.state.config.as_ref()).unwrap();
    let redacted = h.state.config_service.redact_sensitive_values(&rendered);
    assert_eq!(redacted["generation"]["api_key"], "****");
    assert_eq!(redacted["generation"]["max_tokens"], 1000);
}
