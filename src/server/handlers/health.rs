use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::rag::EngineStatus;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let initialized = state.engine.status().await == EngineStatus::Ready;
    Json(json!({
        "status": "ok",
        "initialized": initialized,
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.engine.status().await;
    Json(json!({
        "status": status,
        "passages": state.engine.passage_count().await,
        "active_sessions": state.sessions.len().await,
        "top_k": state.engine.config().top_k,
    }))
}
