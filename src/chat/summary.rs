use std::sync::Arc;

use serde_json::{json, Value};

use super::input::SummarySource;
use crate::core::config::types::SummaryConfig;
use crate::llm::Generator;
use crate::prompt::PromptAssembler;
use crate::session::{SessionError, SessionStore, Turn};

/// Result of a summary request, rendered as the response body by
/// [`SummaryReport::into_json`].
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryReport {
    /// The model's JSON object, passed through unchanged.
    Parsed(Value),
    NoHistory { summary: String },
    Unparsable { summary: String, raw_response: String },
    Failed { summary: String, raw_response: String },
}

impl SummaryReport {
    pub fn into_json(self) -> Value {
        match self {
            SummaryReport::Parsed(value) => value,
            SummaryReport::NoHistory { summary } => json!({ "summary": summary }),
            SummaryReport::Unparsable {
                summary,
                raw_response,
            }
            | SummaryReport::Failed {
                summary,
                raw_response,
            } => json!({ "summary": summary, "raw_response": raw_response }),
        }
    }
}

/// Asks the model for a structured emotional summary of a conversation.
pub struct SummaryService {
    sessions: Arc<dyn SessionStore>,
    assembler: Arc<PromptAssembler>,
    generator: Arc<Generator>,
    config: SummaryConfig,
}

impl SummaryService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        assembler: Arc<PromptAssembler>,
        generator: Arc<Generator>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            sessions,
            assembler,
            generator,
            config,
        }
    }

    pub async fn summarize(&self, source: SummarySource) -> Result<SummaryReport, SessionError> {
        let turns = match source {
            SummarySource::Session(key) => self.sessions.history(&key, None).await?,
            SummarySource::Transcript(turns) => turns,
        };
        Ok(self.summarize_turns(&turns).await)
    }

    async fn summarize_turns(&self, turns: &[Turn]) -> SummaryReport {
        if turns.iter().all(|t| t.content.trim().is_empty()) {
            return SummaryReport::NoHistory {
                summary: self.config.no_history_reply.clone(),
            };
        }

        let prompt = match self
            .assembler
            .assemble_transcript(&self.config.instructions, turns)
        {
            Ok(prompt) => prompt,
            Err(err) => {
                tracing::warn!("Summary prompt could not be built: {}", err);
                return self.failed();
            }
        };
        if prompt.history_dropped > 0 {
            tracing::info!(
                "Summary covers the last {} of {} turns",
                prompt.history_included,
                turns.len()
            );
        }

        let outcome = self
            .generator
            .generate_capped(&prompt.text, Some(self.config.max_new_tokens))
            .await;
        if outcome.is_degraded() {
            return self.failed();
        }

        self.parse(outcome.text)
    }

    fn parse(&self, text: String) -> SummaryReport {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
            return SummaryReport::Parsed(value);
        }

        let extracted = outermost_object(&text)
            .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
            .filter(Value::is_object);
        match extracted {
            Some(value) => SummaryReport::Parsed(value),
            None => {
                tracing::warn!("Summary reply is not JSON");
                SummaryReport::Unparsable {
                    summary: self.config.unparsable_reply.clone(),
                    raw_response: text,
                }
            }
        }
    }

    fn failed(&self) -> SummaryReport {
        SummaryReport::Failed {
            summary: self.config.failure_reply.clone(),
            raw_response: String::new(),
        }
    }
}

/// Text from the first `{` to the last `}`, e.g. a JSON object wrapped in
/// prose or a code fence.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
