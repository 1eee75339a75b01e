use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::decoding::DecodingParams;
use super::error::GenerationError;
use super::llama_server::LlamaServerBackend;
use super::ollama::OllamaBackend;
use crate::core::config::types::BackendConfig;
use crate::core::config::BackendKind;

/// A text-in, text-out language model.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Backend name (e.g. "ollama", "llama_server").
    fn name(&self) -> &str;

    /// Model identifier reported by `/health`.
    fn model(&self) -> &str;

    /// Whether the backend is reachable and serving the model.
    async fn health_check(&self) -> Result<bool, GenerationError>;

    /// Raw completion of `prompt`. Post-processing happens in the generator.
    async fn complete(&self, prompt: &str, params: &DecodingParams) -> Result<String, GenerationError>;
}

pub fn build_backend(
    config: &BackendConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn TextBackend>, GenerationError> {
    let backend: Arc<dyn TextBackend> = match config.kind {
        BackendKind::Ollama => Arc::new(OllamaBackend::new(
            &config.base_url,
            &config.model,
            request_timeout,
        )?),
        BackendKind::LlamaServer => Arc::new(LlamaServerBackend::new(
            &config.base_url,
            &config.model,
            request_timeout,
        )?),
    };
    Ok(backend)
}
