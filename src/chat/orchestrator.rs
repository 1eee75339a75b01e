use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::input::InputError;
use super::safety::CrisisDetector;
use crate::core::config::AppConfig;
use crate::core::errors::ApiError;
use crate::llm::Generator;
use crate::prompt::PromptAssembler;
use crate::rag::{RetrievedPassage, Retriever};
use crate::session::{SessionError, SessionStore, Turn, TurnLocks};

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Input(e) => e.into(),
            TurnError::Session(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    pub sources: Vec<RetrievedPassage>,
}

/// Per-turn knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub history_window: usize,
    pub top_k: usize,
    pub max_message_chars: usize,
    pub empty_message_reply: String,
}

impl TurnSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_window: config.session.history_window,
            top_k: config.retrieval.top_k,
            max_message_chars: config.session.max_message_chars,
            empty_message_reply: config.safety.empty_message_reply.clone(),
        }
    }
}

/// Sequences retrieval, history, prompt assembly, generation and the safety
/// override for one turn, and records both sides of the exchange.
pub struct ChatOrchestrator {
    sessions: Arc<dyn SessionStore>,
    locks: TurnLocks,
    retriever: Retriever,
    assembler: Arc<PromptAssembler>,
    generator: Arc<Generator>,
    crisis: CrisisDetector,
    settings: TurnSettings,
}

impl ChatOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        retriever: Retriever,
        assembler: Arc<PromptAssembler>,
        generator: Arc<Generator>,
        crisis: CrisisDetector,
        settings: TurnSettings,
    ) -> Self {
        Self {
            sessions,
            locks: TurnLocks::new(),
            retriever,
            assembler,
            generator,
            crisis,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Arc<Generator> {
        &self.generator
    }

    pub fn assembler(&self) -> &Arc<PromptAssembler> {
        &self.assembler
    }

    /// Handles one user message. Retrieval and generation failures are
    /// absorbed; only input and storage errors surface.
    pub async fn handle_turn(&self, session_key: &str, user_message: &str) -> Result<TurnReply, TurnError> {
        if user_message.trim().is_empty() {
            return Ok(TurnReply {
                reply: self.settings.empty_message_reply.clone(),
                sources: Vec::new(),
            });
        }

        let chars = user_message.chars().count();
        if chars > self.settings.max_message_chars {
            return Err(InputError::TooLong {
                chars,
                max: self.settings.max_message_chars,
            }
            .into());
        }

        let span = tracing::info_span!(
            "turn",
            session = %session_key,
            request_id = %Uuid::new_v4()
        );
        self.run_turn(session_key, user_message).instrument(span).await
    }

    async fn run_turn(&self, session_key: &str, user_message: &str) -> Result<TurnReply, TurnError> {
        let _guard = self.locks.acquire(session_key).await;

        self.sessions
            .append(session_key, Turn::user(user_message))
            .await?;

        let sources = self.retriever.retrieve(user_message, self.settings.top_k).await;

        // The window is read after our own user turn was appended; drop it so
        // the message appears only in the question section.
        let mut history = self
            .sessions
            .history(session_key, Some(self.settings.history_window + 1))
            .await?;
        history.pop();

        let reply = match self.assembler.assemble(user_message, &history, &sources) {
            Ok(prompt) => {
                tracing::debug!(
                    "Prompt {} units, {} history turns, {} passages",
                    prompt.units,
                    prompt.history_included,
                    prompt.passages_included
                );
                self.generator.generate(&prompt.text).await.text
            }
            Err(err) => {
                tracing::warn!("Prompt assembly failed, replying degraded: {}", err);
                self.generator.degraded_reply().to_string()
            }
        };

        let reply = self.crisis.apply(user_message, reply);

        self.sessions
            .append(session_key, Turn::assistant(reply.clone()))
            .await?;

        Ok(TurnReply { reply, sources })
    }

    /// Answers one message with no retrieval and no session memory. Goes
    /// through the same cleanup, fallback and safety override as a turn.
    pub async fn generate_direct(&self, message: &str) -> Result<String, TurnError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(InputError::EmptyMessage.into());
        }
        let chars = message.chars().count();
        if chars > self.settings.max_message_chars {
            return Err(InputError::TooLong {
                chars,
                max: self.settings.max_message_chars,
            }
            .into());
        }

        let span = tracing::info_span!("generate", request_id = %Uuid::new_v4());
        async {
            let reply = match self.assembler.assemble(message, &[], &[]) {
                Ok(prompt) => self.generator.generate(&prompt.text).await.text,
                Err(err) => {
                    tracing::warn!("Prompt assembly failed, replying degraded: {}", err);
                    self.generator.degraded_reply().to_string()
                }
            };
            Ok(self.crisis.apply(message, reply))
        }
        .instrument(span)
        .await
    }

    /// Full, unwindowed history for `session_key`.
    pub async fn history(&self, session_key: &str) -> Result<Vec<Turn>, SessionError> {
        self.sessions.history(session_key, None).await
    }

    /// Deletes a session once any in-flight turn on it has finished.
    pub async fn forget(&self, session_key: &str) -> Result<bool, SessionError> {
        let existed = {
            let _guard = self.locks.acquire(session_key).await;
            self.sessions.delete(session_key).await?
        };
        self.locks.forget(session_key);
        if existed {
            tracing::info!("Deleted session {}", session_key);
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DecodingParams, DecodingStrategy, GenerationError, OutputCleaner, TextBackend};
    use crate::prompt::PromptTemplate;
    use crate::rag::{Embedder, FlatIndex, IndexFile, IndexedPassage, Passage, RetrievalError};
    use crate::session::{InMemorySessionStore, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes a fixed reply and remembers every prompt it was given.
    struct RecordingBackend {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TextBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording"
        }

        async fn health_check(&self) -> Result<bool, GenerationError> {
            Ok(self.reply.is_some())
        }

        async fn complete(&self, prompt: &str, _params: &DecodingParams) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| GenerationError::Backend("out of memory".to_string()))
        }
    }

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        fn name(&self) -> &str {
            "constant"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn template() -> PromptTemplate {
        PromptTemplate {
            instructions: "INSTR".to_string(),
            history_header: "[history]".to_string(),
            context_header: "[context]".to_string(),
            question_header: "[question]".to_string(),
            answer_marker: "[answer]".to_string(),
            user_label: "U".to_string(),
            assistant_label: "A".to_string(),
        }
    }

    fn retriever() -> Retriever {
        let file = IndexFile {
            dimension: 2,
            model: None,
            passages: vec![
                IndexedPassage {
                    passage: Passage::new("p1", "수면 위생 안내"),
                    embedding: vec![1.0, 0.0],
                },
                IndexedPassage {
                    passage: Passage::new("p2", "직장 스트레스"),
                    embedding: vec![0.0, 1.0],
                },
            ],
        };
        let index = FlatIndex::from_file(file).expect("index");
        Retriever::new(Arc::new(index), Arc::new(ConstantEmbedder))
    }

    fn orchestrator_with(
        backend: Arc<dyn TextBackend>,
        sessions: Arc<dyn SessionStore>,
        retriever: Retriever,
        history_window: usize,
    ) -> ChatOrchestrator {
        let cleaner = OutputCleaner::new(&[], "[answer]", Vec::new()).expect("cleaner");
        let generator = Generator::new(
            backend,
            vec![DecodingStrategy::new("greedy", DecodingParams::greedy(32))],
            cleaner,
            "DEGRADED",
        );
        ChatOrchestrator::new(
            sessions,
            retriever,
            Arc::new(PromptAssembler::with_char_budget(template(), 100_000)),
            Arc::new(generator),
            CrisisDetector::new(&["자살".to_string()], "\n\nHOTLINE 1393"),
            TurnSettings {
                history_window,
                top_k: 1,
                max_message_chars: 1_000,
                empty_message_reply: "PLEASE TYPE".to_string(),
            },
        )
    }

    fn orchestrator(backend: Arc<dyn TextBackend>) -> (ChatOrchestrator, Arc<InMemorySessionStore>) {
        let sessions = Arc::new(InMemorySessionStore::new());
        (
            orchestrator_with(backend, sessions.clone(), retriever(), 6),
            sessions,
        )
    }

    #[tokio::test]
    async fn records_both_turns_and_returns_sources() {
        let backend = RecordingBackend::replying("괜찮아요");
        let (chat, sessions) = orchestrator(backend.clone());

        let reply = chat.handle_turn("s1", "잠이 안 와요").await.expect("turn");
        assert_eq!(reply.reply, "괜찮아요");
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].passage.id, "p1");

        let history = sessions.history("s1", None).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "괜찮아요");

        let prompt = backend.last_prompt();
        assert!(prompt.contains("수면 위생 안내"));
        assert!(prompt.contains("[question]\n잠이 안 와요"));
        assert!(!prompt.contains("[history]"));
    }

    #[tokio::test]
    async fn empty_message_touches_nothing() {
        let backend = RecordingBackend::replying("unused");
        let (chat, sessions) = orchestrator(backend.clone());

        let reply = chat.handle_turn("s1", "   ").await.expect("turn");
        assert_eq!(reply.reply, "PLEASE TYPE");
        assert_eq!(backend.calls(), 0);
        assert_eq!(sessions.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn crisis_keyword_appends_hotline_after_generation() {
        let (chat, _) = orchestrator(RecordingBackend::replying("모델 답변"));
        let reply = chat.handle_turn("s1", "자살하고 싶어요").await.expect("turn");
        assert!(reply.reply.ends_with("\n\nHOTLINE 1393"));
        assert!(reply.reply.starts_with("모델 답변"));
        assert_eq!(reply.reply.matches("HOTLINE 1393").count(), 1);
    }

    #[tokio::test]
    async fn crisis_message_survives_degraded_generation() {
        let (chat, _) = orchestrator(RecordingBackend::failing());
        let reply = chat.handle_turn("s1", "자살").await.expect("turn");
        assert_eq!(reply.reply, "DEGRADED\n\nHOTLINE 1393");
    }

    #[tokio::test]
    async fn failing_backend_still_yields_a_reply() {
        let backend = RecordingBackend::failing();
        let (chat, sessions) = orchestrator(backend.clone());

        let reply = chat.handle_turn("s1", "hello").await.expect("turn");
        assert_eq!(reply.reply, "DEGRADED");
        assert_eq!(backend.calls(), 1);
        let history = sessions.history("s1", None).await.expect("history");
        assert_eq!(history[1].content, "DEGRADED");
    }

    #[tokio::test]
    async fn prompt_holds_only_the_recent_window() {
        let backend = RecordingBackend::replying("ok");
        let (chat, sessions) = orchestrator(backend.clone());

        for i in 0..5 {
            chat.handle_turn("s1", &format!("msg{}", i)).await.expect("turn");
        }
        // Ten turns stored; the sixth call sees the last six of them.
        chat.handle_turn("s1", "msg5").await.expect("turn");

        let prompt = backend.last_prompt();
        assert!(!prompt.contains("msg0"));
        assert!(!prompt.contains("msg1"));
        for kept in ["msg2", "msg3", "msg4"] {
            assert!(prompt.contains(&format!("U: {}", kept)), "missing {}", kept);
        }
        assert_eq!(prompt.matches("A: ok").count(), 3);
        assert_eq!(prompt.matches("msg5").count(), 1);

        let all = sessions.history("s1", None).await.expect("history");
        assert_eq!(all.len(), 12);
    }

    #[tokio::test]
    async fn unavailable_index_still_generates() {
        let backend = RecordingBackend::replying("context-free reply");
        let sessions = Arc::new(InMemorySessionStore::new());
        let retriever = Retriever::unavailable(Arc::new(ConstantEmbedder), "broken");
        let chat = orchestrator_with(backend.clone(), sessions, retriever, 6);

        let reply = chat.handle_turn("s1", "잠이 안 와요").await.expect("turn");
        assert_eq!(reply.reply, "context-free reply");
        assert!(reply.sources.is_empty());
        assert!(!backend.last_prompt().contains("[context]"));
    }

    #[tokio::test]
    async fn overlong_message_is_an_input_error() {
        let (chat, sessions) = orchestrator(RecordingBackend::replying("ok"));
        let err = chat.handle_turn("s1", &"가".repeat(1_001)).await.unwrap_err();
        assert!(matches!(err, TurnError::Input(InputError::TooLong { .. })));
        assert_eq!(sessions.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_key_stay_paired() {
        let (chat, sessions) = orchestrator(RecordingBackend::replying("ok"));
        let chat = Arc::new(chat);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let chat = chat.clone();
                tokio::spawn(async move { chat.handle_turn("shared", &format!("m{}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join").expect("turn");
        }

        let history = sessions.history("shared", None).await.expect("history");
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn forget_removes_the_session() {
        let (chat, _) = orchestrator(RecordingBackend::replying("ok"));
        chat.handle_turn("gone", "hi").await.expect("turn");

        assert!(chat.forget("gone").await.expect("forget"));
        assert!(!chat.forget("gone").await.expect("forget"));
        assert!(chat.history("gone").await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn direct_generation_skips_retrieval_and_memory() {
        let backend = RecordingBackend::replying("바로 답변");
        let (chat, sessions) = orchestrator(backend.clone());

        let reply = chat.generate_direct(" 잠이 안 와요 ").await.expect("generate");
        assert_eq!(reply, "바로 답변");

        let prompt = backend.last_prompt();
        assert!(prompt.contains("[question]\n잠이 안 와요"));
        assert!(!prompt.contains("[context]"));
        assert!(!prompt.contains("수면 위생 안내"));
        assert_eq!(sessions.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn direct_generation_rejects_blank_message() {
        let backend = RecordingBackend::replying("unused");
        let (chat, _) = orchestrator(backend.clone());

        let err = chat.generate_direct("  ").await.unwrap_err();
        assert!(matches!(err, TurnError::Input(InputError::EmptyMessage)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn direct_generation_degrades_and_keeps_crisis_message() {
        let (chat, _) = orchestrator(RecordingBackend::failing());
        let reply = chat.generate_direct("자살").await.expect("generate");
        assert_eq!(reply, "DEGRADED\n\nHOTLINE 1393");
    }
}
