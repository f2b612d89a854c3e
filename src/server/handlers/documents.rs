use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::SourceDocument;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DocumentUpload {
    pub name: String,
    pub content: String,
    pub file_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<DocumentUpload>,
}

/// Chunk, embed and add uploaded documents, then persist the index.
pub async fn ingest_documents(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.documents.is_empty() {
        return Err(ApiError::BadRequest("No documents provided".to_string()));
    }

    let documents: Vec<SourceDocument> = payload
        .documents
        .into_iter()
        .map(|upload| {
            let mut document = SourceDocument::new(upload.content, upload.name);
            if let Some(file_type) = upload.file_type.filter(|t| !t.trim().is_empty()) {
                document.file_type = file_type;
            }
            document
        })
        .collect();

    let added = state
        .engine
        .ingest_and_save(&documents, &state.index_path)
        .await?;

    Ok(Json(json!({
        "success": true,
        "documents": documents.len(),
        "passages_added": added,
        "total_passages": state.engine.passage_count().await,
    })))
}
