use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let turns = state.chat.history(&thread_id).await?;
    let payload: Vec<Value> = turns
        .into_iter()
        .map(|turn| {
            json!({
                "role": turn.role,
                "content": turn.content,
                "created_at": turn.created_at,
            })
        })
        .collect();
    Ok(Json(json!({
        "thread_id": thread_id,
        "turns": payload,
    })))
}

pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = if state.chat.forget(&thread_id).await? {
        "ok"
    } else {
        "not_found"
    };
    Ok(Json(json!({ "status": status, "thread_id": thread_id })))
}
