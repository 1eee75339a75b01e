use crate::core::config::types::SafetyConfig;

/// Fixed keyword check on the user's message. The hotline text is appended
/// after generation, whatever the model said.
#[derive(Debug, Clone)]
pub struct CrisisDetector {
    keywords: Vec<String>,
    message: String,
}

impl CrisisDetector {
    pub fn new(keywords: &[String], message: impl Into<String>) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            message: message.into(),
        }
    }

    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(&config.crisis_keywords, config.crisis_message.clone())
    }

    /// Case-insensitive substring match against the keyword list.
    pub fn matches(&self, user_message: &str) -> bool {
        let lowered = user_message.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// `reply` with the crisis message appended once when `user_message` matches.
    pub fn apply(&self, user_message: &str, mut reply: String) -> String {
        if self.matches(user_message) {
            tracing::info!("Crisis keyword detected, appending hotline message");
            reply.push_str(&self.message);
        }
        reply
    }
}
