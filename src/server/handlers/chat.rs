use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::rag::SourceCitation;
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub include_sources: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
    pub session_id: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_message(&payload.message)?;
    let session_id = resolve_session_id(payload.session_id);
    let session = state.sessions.get_or_create(&session_id).await?;

    let mut session = session.lock().await;
    let response = state
        .engine
        .query(&mut session.memory, &payload.message, payload.include_sources)
        .await?;

    Ok(Json(ChatResponse {
        answer: response.answer,
        sources: response.sources,
        session_id,
    }))
}

/// Chat with similarity scores on every source, for debugging retrieval.
pub async fn chat_with_scores(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_message(&payload.message)?;
    let session_id = resolve_session_id(payload.session_id);
    let session = state.sessions.get_or_create(&session_id).await?;

    let mut session = session.lock().await;
    let response = state
        .engine
        .query_with_scores(&mut session.memory, &payload.message)
        .await?;

    Ok(Json(ChatResponse {
        answer: response.answer,
        sources: response.sources,
        session_id,
    }))
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(session) = state.sessions.get(&payload.session_id).await {
        let mut session = session.lock().await;
        state.engine.clear_history(&mut session.memory);
    }
    Ok(Json(json!({"success": true, "session_id": payload.session_id})))
}

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

fn resolve_session_id(requested: Option<String>) -> String {
    requested
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
