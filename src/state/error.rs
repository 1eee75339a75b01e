use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize session store: {0}")]
    Sessions(#[source] anyhow::Error),

    #[error("Failed to initialize retriever: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("Failed to initialize prompt budget: {0}")]
    Prompt(#[source] anyhow::Error),

    #[error("Failed to initialize generator: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Generation backend '{backend}' is not serving model '{model}'")]
    BackendUnreachable { backend: String, model: String },
}
