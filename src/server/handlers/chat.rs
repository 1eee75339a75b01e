use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::chat::ChatRequest;
use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let turn = request.normalize(&state.config.session.default_key)?;

    let reply = state.chat.handle_turn(&turn.session_key, &turn.message).await?;

    let sources: Vec<Value> = reply
        .sources
        .iter()
        .map(|hit| {
            json!({
                "id": hit.passage.id,
                "content": hit.passage.content,
                "metadata": hit.passage.metadata,
                "rank": hit.rank,
                "score": hit.score,
            })
        })
        .collect();

    Ok(Json(json!({
        "reply": reply.reply,
        "thread_id": turn.session_key,
        "sources": sources,
    })))
}
