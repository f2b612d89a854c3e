use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// The effective configuration, with secrets redacted.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let config = serde_json::to_value(state.config.as_ref()).map_err(ApiError::internal)?;
    let redacted = state.config_service.redact_sensitive_values(&config);
    Ok(Json(redacted))
}
