use crate::core::config::types::PromptConfig;

/// Section labels and role instructions for one kind of prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub instructions: String,
    pub history_header: String,
    pub context_header: String,
    pub question_header: String,
    pub answer_marker: String,
    pub user_label: String,
    pub assistant_label: String,
}

impl PromptTemplate {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            instructions: config.instructions.clone(),
            history_header: config.history_header.clone(),
            context_header: config.context_header.clone(),
            question_header: config.question_header.clone(),
            answer_marker: config.answer_marker.clone(),
            user_label: config.user_label.clone(),
            assistant_label: config.assistant_label.clone(),
        }
    }

    /// Same layout with different role instructions.
    pub fn with_instructions(&self, instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            ..self.clone()
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default())
    }
}
