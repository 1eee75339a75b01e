use regex::Regex;

use super::error::GenerationError;

/// Turns raw model output into a reply: drops echoed prompt text, control
/// tokens and any turn the model starts writing on the user's behalf.
#[derive(Debug, Clone)]
pub struct OutputCleaner {
    strip: Vec<Regex>,
    answer_marker: String,
    stop_markers: Vec<String>,
}

impl OutputCleaner {
    pub fn new(
        strip_patterns: &[String],
        answer_marker: impl Into<String>,
        stop_markers: Vec<String>,
    ) -> Result<Self, GenerationError> {
        let strip = strip_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            strip,
            answer_marker: answer_marker.into(),
            stop_markers: stop_markers.into_iter().filter(|m| !m.is_empty()).collect(),
        })
    }

    /// `None` when nothing usable is left.
    pub fn clean(&self, prompt: &str, raw: &str) -> Option<String> {
        let marker_at = if self.answer_marker.is_empty() {
            None
        } else {
            raw.rfind(&self.answer_marker)
        };
        let mut text = match marker_at {
            Some(pos) => &raw[pos + self.answer_marker.len()..],
            None => raw.strip_prefix(prompt).unwrap_or(raw),
        }
        .to_string();

        for pattern in &self.strip {
            text = pattern.replace_all(&text, "").into_owned();
        }

        let cut = self
            .stop_markers
            .iter()
            .filter_map(|marker| text.find(marker.as_str()))
            .filter(|&pos| pos > 0)
            .min();
        if let Some(pos) = cut {
            text.truncate(pos);
        }

        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
