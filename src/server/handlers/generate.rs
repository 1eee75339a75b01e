use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::chat::GenerateRequest;
use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let message = request.message()?;

    let reply = state.chat.generate_direct(&message).await?;

    Ok(Json(json!({
        "response": reply,
        "thread_id": request.thread_id,
    })))
}
