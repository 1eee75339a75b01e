use std::sync::Arc;

use thiserror::Error;

use super::counter::{CharCounter, TokenCounter};
use super::template::PromptTemplate;
use crate::rag::RetrievedPassage;
use crate::session::{Role, Turn};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt needs {needed} {unit} without history or context, budget is {budget}")]
    OverBudget {
        needed: usize,
        budget: usize,
        unit: &'static str,
    },
    #[error("tokenizer unavailable: {0}")]
    Tokenizer(String),
}

/// A rendered prompt and what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub text: String,
    pub units: usize,
    pub history_included: usize,
    pub history_dropped: usize,
    pub passages_included: usize,
    pub passages_dropped: usize,
}

/// Renders instructions, history, retrieved passages and the current message
/// into one prompt that fits `budget` units.
///
/// When the full prompt is too large, the oldest history turns are dropped
/// first, then the lowest-ranked passages. The instructions and the current
/// message are never cut.
pub struct PromptAssembler {
    template: PromptTemplate,
    counter: Arc<dyn TokenCounter>,
    budget: usize,
}

impl PromptAssembler {
    pub fn new(template: PromptTemplate, counter: Arc<dyn TokenCounter>, budget: usize) -> Self {
        Self {
            template,
            counter,
            budget,
        }
    }

    /// Character-budgeted assembler.
    pub fn with_char_budget(template: PromptTemplate, budget: usize) -> Self {
        Self::new(template, Arc::new(CharCounter), budget)
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Unit the budget is counted in, `chars` or `tokens`.
    pub fn unit(&self) -> &'static str {
        self.counter.unit()
    }

    /// Units the template takes around an empty message, with no history
    /// and no passages.
    pub fn fixed_units(&self) -> usize {
        self.counter.count(&render(&self.template, Some(""), &[], &[]))
    }

    /// Prompt for one conversational turn. `history` is oldest first and
    /// `passages` best first.
    pub fn assemble(
        &self,
        user_message: &str,
        history: &[Turn],
        passages: &[RetrievedPassage],
    ) -> Result<AssembledPrompt, PromptError> {
        self.fit(&self.template, Some(user_message), history, passages)
    }

    /// Prompt over a transcript with no current message, e.g. for a
    /// session summary.
    pub fn assemble_transcript(
        &self,
        instructions: &str,
        history: &[Turn],
    ) -> Result<AssembledPrompt, PromptError> {
        let template = self.template.with_instructions(instructions);
        self.fit(&template, None, history, &[])
    }

    fn fit(
        &self,
        template: &PromptTemplate,
        message: Option<&str>,
        history: &[Turn],
        passages: &[RetrievedPassage],
    ) -> Result<AssembledPrompt, PromptError> {
        let mut history_start = 0;
        let mut passage_count = passages.len();

        loop {
            let text = render(
                template,
                message,
                &history[history_start..],
                &passages[..passage_count],
            );
            let units = self.counter.count(&text);
            if units <= self.budget {
                if history_start > 0 || passage_count < passages.len() {
                    tracing::debug!(
                        "Prompt trimmed to {} {}: dropped {} history turns, {} passages",
                        units,
                        self.counter.unit(),
                        history_start,
                        passages.len() - passage_count
                    );
                }
                return Ok(AssembledPrompt {
                    text,
                    units,
                    history_included: history.len() - history_start,
                    history_dropped: history_start,
                    passages_included: passage_count,
                    passages_dropped: passages.len() - passage_count,
                });
            }

            if history_start < history.len() {
                history_start += 1;
            } else if passage_count > 0 {
                passage_count -= 1;
            } else {
                return Err(PromptError::OverBudget {
                    needed: units,
                    budget: self.budget,
                    unit: self.counter.unit(),
                });
            }
        }
    }
}

fn render(
    template: &PromptTemplate,
    message: Option<&str>,
    history: &[Turn],
    passages: &[RetrievedPassage],
) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(5);

    let instructions = template.instructions.trim();
    if !instructions.is_empty() {
        sections.push(instructions.to_string());
    }

    if !history.is_empty() {
        let lines: Vec<String> = history
            .iter()
            .map(|turn| {
                let label = match turn.role {
                    Role::User => &template.user_label,
                    Role::Assistant => &template.assistant_label,
                };
                format!("{}: {}", label, turn.content.trim())
            })
            .collect();
        sections.push(format!("{}\n{}", template.history_header, lines.join("\n")));
    }

    if !passages.is_empty() {
        let body: Vec<&str> = passages.iter().map(|p| p.passage.content.trim()).collect();
        sections.push(format!("{}\n{}", template.context_header, body.join("\n\n")));
    }

    if let Some(message) = message {
        sections.push(format!("{}\n{}", template.question_header, message.trim()));
    }

    sections.push(template.answer_marker.clone());
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::Passage;

    fn template() -> PromptTemplate {
        PromptTemplate {
            instructions: "Be kind.".to_string(),
            history_header: "[history]".to_string(),
            context_header: "[context]".to_string(),
            question_header: "[question]".to_string(),
            answer_marker: "[answer]".to_string(),
            user_label: "U".to_string(),
            assistant_label: "A".to_string(),
        }
    }

    fn passage(rank: usize, content: &str) -> RetrievedPassage {
        RetrievedPassage {
            passage: Passage::new(rank.to_string(), content),
            rank,
            score: 1.0 / rank as f32,
        }
    }

    fn history(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("user{}", i))
                } else {
                    Turn::assistant(format!("bot{}", i))
                }
            })
            .collect()
    }

    #[test]
    fn renders_sections_in_order() {
        let assembler = PromptAssembler::with_char_budget(template(), 10_000);
        let prompt = assembler
            .assemble("help me", &history(2), &[passage(1, "P1"), passage(2, "P2")])
            .expect("assemble");

        assert_eq!(
            prompt.text,
            "Be kind.\n\n[history]\nU: user0\nA: bot1\n\n[context]\nP1\n\nP2\n\n[question]\nhelp me\n\n[answer]"
        );
        assert_eq!(prompt.history_included, 2);
        assert_eq!(prompt.passages_included, 2);
        assert_eq!(prompt.units, prompt.text.chars().count());
    }

    #[test]
    fn empty_sections_are_omitted() {
        let assembler = PromptAssembler::with_char_budget(template(), 10_000);
        let prompt = assembler.assemble("hi", &[], &[]).expect("assemble");
        assert_eq!(prompt.text, "Be kind.\n\n[question]\nhi\n\n[answer]");
    }

    #[test]
    fn drops_oldest_history_before_passages() {
        let full = PromptAssembler::with_char_budget(template(), 10_000)
            .assemble("q", &history(4), &[passage(1, "P1")])
            .expect("assemble");
        // Room for everything except the first turn ("U: user0\n" is 9 chars).
        let assembler = PromptAssembler::with_char_budget(template(), full.units - 1);
        let prompt = assembler
            .assemble("q", &history(4), &[passage(1, "P1")])
            .expect("assemble");

        assert_eq!(prompt.history_dropped, 1);
        assert_eq!(prompt.passages_dropped, 0);
        assert!(!prompt.text.contains("user0"));
        assert!(prompt.text.contains("bot3"));
        assert!(prompt.units <= assembler.budget());
    }

    #[test]
    fn drops_lowest_ranked_passage_once_history_is_gone() {
        let passages = [passage(1, "best passage"), passage(2, "worst passage")];
        let without_worst = PromptAssembler::with_char_budget(template(), 10_000)
            .assemble("q", &[], &passages[..1])
            .expect("assemble");

        let assembler = PromptAssembler::with_char_budget(template(), without_worst.units);
        let prompt = assembler
            .assemble("q", &history(2), &passages)
            .expect("assemble");

        assert_eq!(prompt.history_included, 0);
        assert_eq!(prompt.passages_included, 1);
        assert!(prompt.text.contains("best passage"));
        assert!(!prompt.text.contains("worst passage"));
    }

    #[test]
    fn message_is_never_truncated() {
        let message = "가".repeat(200);
        let assembler = PromptAssembler::with_char_budget(template(), 50);
        let err = assembler
            .assemble(&message, &history(3), &[passage(1, "P1")])
            .unwrap_err();
        assert!(matches!(err, PromptError::OverBudget { budget: 50, .. }));
    }

    #[test]
    fn fixed_units_plus_message_is_the_bare_prompt() {
        let assembler = PromptAssembler::with_char_budget(template(), 10_000);
        let prompt = assembler.assemble("hello", &[], &[]).expect("assemble");
        assert_eq!(assembler.fixed_units() + 5, prompt.units);

        let exact = PromptAssembler::with_char_budget(template(), assembler.fixed_units() + 5);
        assert!(exact.assemble("hello", &history(2), &[]).is_ok());
    }

    #[test]
    fn transcript_uses_its_own_instructions() {
        let assembler = PromptAssembler::with_char_budget(template(), 10_000);
        let prompt = assembler
            .assemble_transcript("Summarise as JSON.", &history(2))
            .expect("assemble");
        assert!(prompt.text.starts_with("Summarise as JSON."));
        assert!(!prompt.text.contains("[question]"));
        assert!(prompt.text.ends_with("[answer]"));
    }
}
