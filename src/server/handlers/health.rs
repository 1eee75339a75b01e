use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::rag::RetrieverStatus;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.chat.generator().backend();
    let model_status = match backend.health_check().await {
        Ok(true) => "loaded",
        Ok(false) => "unavailable",
        Err(err) => {
            tracing::warn!("Backend health check failed: {}", err);
            "unavailable"
        }
    };

    let retriever = state.chat.retriever().status();
    let passages = match &retriever {
        RetrieverStatus::Loaded { passages, .. } => *passages,
        RetrieverStatus::NotLoaded { .. } => 0,
    };
    let sessions = state.chat.sessions().count().await.unwrap_or(0);

    Json(json!({
        "status": "ok",
        "model": backend.model(),
        "backend": backend.name(),
        "model_status": model_status,
        "retriever_status": retriever,
        "passages": passages,
        "sessions": sessions,
    }))
}
