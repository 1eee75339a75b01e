use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatOrchestrator, CrisisDetector, SummaryService, TurnSettings};
use crate::core::config::{AppConfig, AppPaths, BudgetUnit, SessionBackend};
use crate::llm::{build_backend, Generator, TextBackend};
use crate::prompt::{CharCounter, HfTokenCounter, PromptAssembler, PromptTemplate, TokenCounter};
use crate::rag::{HttpEmbedder, Retriever};
use crate::session::{InMemorySessionStore, SessionStore, SqliteSessionStore};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// The retriever, generator and prompt assembler are built once here and
/// live for the whole process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chat: Arc<ChatOrchestrator>,
    pub summaries: Arc<SummaryService>,
}

impl AppState {
    /// Builds every component from configuration.
    ///
    /// An unreadable passage index only disables retrieval. A generation
    /// backend that does not answer its health check is fatal unless
    /// `generation.require_backend_on_startup` is off.
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let sessions: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Memory => Arc::new(InMemorySessionStore::new()),
            SessionBackend::Sqlite => Arc::new(
                SqliteSessionStore::new(&paths.session_db_path)
                    .await
                    .map_err(|e| InitializationError::Sessions(e.into()))?,
            ),
        };
        tracing::info!("Session store: {}", sessions.name());

        let embedder = Arc::new(
            HttpEmbedder::new(&config.retrieval.embedder)
                .map_err(|e| InitializationError::Retrieval(e.into()))?,
        );
        let index_path = paths.resolve(&config.retrieval.index_path);
        let retriever = Retriever::load_or_degrade(&index_path, embedder)
            .with_query_prefix(config.retrieval.query_prefix.clone());

        let request_timeout = Duration::from_secs(config.generation.timeout_secs + 5);
        let backend = build_backend(&config.generation.backend, request_timeout)
            .map_err(|e| InitializationError::Llm(e.into()))?;

        if config.generation.require_backend_on_startup {
            let healthy = backend.health_check().await.unwrap_or(false);
            if !healthy {
                return Err(InitializationError::BackendUnreachable {
                    backend: backend.name().to_string(),
                    model: backend.model().to_string(),
                });
            }
        }
        tracing::info!(
            "Generation backend {} ready with model {}",
            backend.name(),
            backend.model()
        );

        Self::from_parts(&paths, config, sessions, retriever, backend)
    }

    /// Wires already-built collaborators together.
    pub fn from_parts(
        paths: &AppPaths,
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        retriever: Retriever,
        backend: Arc<dyn TextBackend>,
    ) -> Result<Arc<Self>, InitializationError> {
        let counter: Arc<dyn TokenCounter> = match config.prompt.budget.unit {
            BudgetUnit::Chars => Arc::new(CharCounter),
            BudgetUnit::Tokens => {
                let raw = config.prompt.budget.tokenizer_path.as_deref().unwrap_or("tokenizer.json");
                Arc::new(
                    HfTokenCounter::from_file(&paths.resolve(raw))
                        .map_err(|e| InitializationError::Prompt(e.into()))?,
                )
            }
        };
        let assembler = Arc::new(PromptAssembler::new(
            PromptTemplate::from_config(&config.prompt),
            counter,
            config.prompt.budget.max_units,
        ));

        let generator = Arc::new(
            Generator::from_config(&config.generation, &config.prompt, backend)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let chat = Arc::new(ChatOrchestrator::new(
            sessions.clone(),
            retriever,
            assembler.clone(),
            generator.clone(),
            CrisisDetector::from_config(&config.safety),
            TurnSettings::from_config(&config),
        ));
        let summaries = Arc::new(SummaryService::new(
            sessions,
            assembler,
            generator,
            config.summary.clone(),
        ));

        Ok(Arc::new(AppState {
            config: Arc::new(config),
            chat,
            summaries,
        }))
    }
}
