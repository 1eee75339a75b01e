use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::chat::SummaryRequest;
use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn summary(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let source = request.into_source(&state.config.session.default_key);
    let report = state.summaries.summarize(source).await?;
    Ok(Json(report.into_json()))
}
