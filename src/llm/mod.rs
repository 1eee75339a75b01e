//! Text generation: HTTP backends, decoding strategies and the fallback chain.

mod backend;
mod decoding;
mod error;
mod generator;
mod llama_server;
mod ollama;
mod postprocess;

pub use backend::{build_backend, TextBackend};
pub use decoding::{DecodingParams, DecodingStrategy};
pub use error::GenerationError;
pub use generator::{GenerationOutcome, GenerationState, Generator};
pub use llama_server::LlamaServerBackend;
pub use ollama::OllamaBackend;
pub use postprocess::OutputCleaner;
