use regex::Regex;

use super::types::{AppConfig, BudgetUnit};
use crate::core::errors::ApiError;
use crate::prompt::{PromptAssembler, PromptTemplate};

pub fn validate_config(config: &AppConfig) -> Result<(), ApiError> {
    if config.server.host.trim().is_empty() {
        return Err(config_error("server.host", "must not be empty"));
    }

    if config.session.default_key.trim().is_empty() {
        return Err(config_error("session.default_key", "must not be empty"));
    }
    validate_range("session.history_window", config.session.history_window, 0, 1_000)?;
    validate_range(
        "session.max_message_chars",
        config.session.max_message_chars,
        1,
        1_000_000,
    )?;

    validate_range("retrieval.top_k", config.retrieval.top_k, 0, 100)?;
    validate_range(
        "retrieval.embedder.timeout_secs",
        config.retrieval.embedder.timeout_secs as usize,
        1,
        3_600,
    )?;

    validate_range("prompt.budget.max_units", config.prompt.budget.max_units, 1, 10_000_000)?;
    if config.prompt.budget.unit == BudgetUnit::Tokens && config.prompt.budget.tokenizer_path.is_none()
    {
        return Err(config_error(
            "prompt.budget.tokenizer_path",
            "is required when prompt.budget.unit is 'tokens'",
        ));
    }
    if config.prompt.budget.unit == BudgetUnit::Chars {
        let template = PromptTemplate::from_config(&config.prompt);
        let fixed = PromptAssembler::with_char_budget(template, config.prompt.budget.max_units)
            .fixed_units();
        let needed = fixed + config.session.max_message_chars;
        if config.prompt.budget.max_units < needed {
            return Err(config_error(
                "prompt.budget.max_units",
                &format!(
                    "must be at least {} (session.max_message_chars plus {} template chars)",
                    needed, fixed
                ),
            ));
        }
    }
    if config.prompt.answer_marker.trim().is_empty() {
        return Err(config_error("prompt.answer_marker", "must not be empty"));
    }

    let generation = &config.generation;
    if generation.strategies.is_empty() {
        return Err(config_error("generation.strategies", "must list at least one strategy"));
    }
    for (idx, strategy) in generation.strategies.iter().enumerate() {
        let field = format!("generation.strategies[{}]", idx);
        if strategy.num_beams == 0 {
            return Err(config_error(&field, "num_beams must be at least 1"));
        }
        if strategy.max_new_tokens == 0 {
            return Err(config_error(&field, "max_new_tokens must be at least 1"));
        }
        if let Some(t) = strategy.temperature {
            if !(0.0..=5.0).contains(&t) {
                return Err(config_error(&field, "temperature must be within 0.0..=5.0"));
            }
        }
        if let Some(p) = strategy.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(config_error(&field, "top_p must be within 0.0..=1.0"));
            }
        }
    }
    validate_range("generation.timeout_secs", generation.timeout_secs as usize, 1, 3_600)?;
    validate_range("generation.max_concurrent", generation.max_concurrent, 1, 1_024)?;
    if generation.degraded_reply.trim().is_empty() {
        return Err(config_error("generation.degraded_reply", "must not be empty"));
    }
    for pattern in &generation.strip_patterns {
        Regex::new(pattern).map_err(|e| {
            config_error(
                "generation.strip_patterns",
                &format!("invalid pattern '{}': {}", pattern, e),
            )
        })?;
    }

    if config
        .safety
        .crisis_keywords
        .iter()
        .any(|k| k.trim().is_empty())
    {
        return Err(config_error("safety.crisis_keywords", "must not contain blank entries"));
    }
    if config.safety.empty_message_reply.trim().is_empty() {
        return Err(config_error("safety.empty_message_reply", "must not be empty"));
    }

    validate_range("summary.max_new_tokens", config.summary.max_new_tokens as usize, 1, 100_000)?;

    Ok(())
}

fn validate_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err(config_error(
            field,
            &format!("must be within {}..={} (got {})", min, max, value),
        ));
    }
    Ok(())
}

fn config_error(field: &str, message: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config '{}': {}", field, message))
}
