use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Static description of the loaded model and how it is driven.
pub async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let generator = state.chat.generator();
    let backend = generator.backend();
    let assembler = state.chat.assembler();

    let strategies: Vec<Value> = generator
        .strategies()
        .iter()
        .map(|strategy| {
            json!({
                "name": strategy.name,
                "do_sample": strategy.params.do_sample,
                "num_beams": strategy.params.num_beams,
                "max_new_tokens": strategy.params.max_new_tokens,
            })
        })
        .collect();

    Json(json!({
        "model": backend.model(),
        "backend": backend.name(),
        "strategies": strategies,
        "prompt_budget": {
            "unit": assembler.unit(),
            "max_units": assembler.budget(),
        },
        "history_window": state.config.session.history_window,
        "top_k": state.config.retrieval.top_k,
        "max_message_chars": state.config.session.max_message_chars,
    }))
}
