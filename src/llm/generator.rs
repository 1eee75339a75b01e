use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use super::backend::TextBackend;
use super::decoding::{DecodingParams, DecodingStrategy};
use super::error::GenerationError;
use super::postprocess::OutputCleaner;
use crate::core::config::types::{GenerationConfig, PromptConfig};

/// How a reply was obtained. Callers of [`Generator::generate`] get a usable
/// string either way; the state is for logs and the summary endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationState {
    Success { strategy: String, attempt: usize },
    Degraded { failures: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub text: String,
    pub state: GenerationState,
}

impl GenerationOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self.state, GenerationState::Degraded { .. })
    }
}

/// Runs decoding strategies in order until one yields usable text.
///
/// Every call holds one slot of a process-wide semaphore for its whole
/// chain, so with `max_concurrent = 1` the backend never sees two prompts
/// at once. Each attempt is bounded by `attempt_timeout`.
pub struct Generator {
    backend: Arc<dyn TextBackend>,
    strategies: Vec<DecodingStrategy>,
    cleaner: OutputCleaner,
    degraded_reply: String,
    slots: Arc<Semaphore>,
    attempt_timeout: Duration,
}

impl Generator {
    /// A deterministic single-beam strategy is appended when the chain does
    /// not already end with one.
    pub fn new(
        backend: Arc<dyn TextBackend>,
        mut strategies: Vec<DecodingStrategy>,
        cleaner: OutputCleaner,
        degraded_reply: impl Into<String>,
    ) -> Self {
        let ends_safe = strategies
            .last()
            .map(|s| s.params.is_deterministic() && s.params.num_beams == 1)
            .unwrap_or(false);
        if !ends_safe {
            let max_new_tokens = strategies
                .first()
                .map(|s| s.params.max_new_tokens)
                .unwrap_or(256);
            strategies.push(DecodingStrategy::new(
                "greedy",
                DecodingParams::greedy(max_new_tokens),
            ));
        }

        Self {
            backend,
            strategies,
            cleaner,
            degraded_reply: degraded_reply.into(),
            slots: Arc::new(Semaphore::new(1)),
            attempt_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(
        config: &GenerationConfig,
        prompt: &PromptConfig,
        backend: Arc<dyn TextBackend>,
    ) -> Result<Self, GenerationError> {
        let cleaner = OutputCleaner::new(
            &config.strip_patterns,
            prompt.answer_marker.clone(),
            vec![
                format!("\n{}:", prompt.user_label),
                prompt.question_header.clone(),
            ],
        )?;
        let strategies = config
            .strategies
            .iter()
            .map(DecodingStrategy::from_config)
            .collect();

        Ok(Self::new(backend, strategies, cleaner, config.degraded_reply.clone())
            .with_max_concurrent(config.max_concurrent)
            .with_attempt_timeout(Duration::from_secs(config.timeout_secs)))
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn TextBackend> {
        &self.backend
    }

    pub fn strategies(&self) -> &[DecodingStrategy] {
        &self.strategies
    }

    pub fn degraded_reply(&self) -> &str {
        &self.degraded_reply
    }

    pub async fn generate(&self, prompt: &str) -> GenerationOutcome {
        self.generate_capped(prompt, None).await
    }

    /// Like [`Generator::generate`], overriding every strategy's output cap.
    pub async fn generate_capped(&self, prompt: &str, max_new_tokens: Option<u32>) -> GenerationOutcome {
        let _permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(e) => return self.degraded(vec![GenerationError::Unavailable(e.to_string()).to_string()]),
        };

        let mut failures = Vec::new();
        for (attempt, strategy) in self.strategies.iter().enumerate() {
            let strategy = match max_new_tokens {
                Some(cap) => strategy.with_max_new_tokens(cap),
                None => strategy.clone(),
            };

            let started = Instant::now();
            match self.attempt(prompt, &strategy).await {
                Ok(text) => {
                    tracing::info!(
                        "Generated {} chars with '{}' in {:?}",
                        text.chars().count(),
                        strategy.name,
                        started.elapsed()
                    );
                    return GenerationOutcome {
                        text,
                        state: GenerationState::Success {
                            strategy: strategy.name,
                            attempt: attempt + 1,
                        },
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        "Generation attempt {} ('{}') failed: {}",
                        attempt + 1,
                        strategy.name,
                        err
                    );
                    failures.push(format!("{}: {}", strategy.name, err));
                }
            }
        }

        self.degraded(failures)
    }

    async fn attempt(&self, prompt: &str, strategy: &DecodingStrategy) -> Result<String, GenerationError> {
        let raw = tokio::time::timeout(
            self.attempt_timeout,
            self.backend.complete(prompt, &strategy.params),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.attempt_timeout))??;

        self.cleaner
            .clean(prompt, &raw)
            .ok_or(GenerationError::EmptyOutput)
    }

    fn degraded(&self, failures: Vec<String>) -> GenerationOutcome {
        tracing::warn!(
            "All {} generation strategies failed, returning degraded reply",
            self.strategies.len()
        );
        GenerationOutcome {
            text: self.degraded_reply.clone(),
            state: GenerationState::Degraded { failures },
        }
    }
}
