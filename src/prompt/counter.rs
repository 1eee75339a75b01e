use std::path::Path;

use tokenizers::Tokenizer;

use super::assembler::PromptError;

/// Measures text in the unit the prompt budget is expressed in.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn unit(&self) -> &'static str;
}

/// Counts Unicode scalar values, so Hangul and ASCII weigh the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn unit(&self) -> &'static str {
        "chars"
    }
}

/// Counts tokens with the generator's own `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| PromptError::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::warn!("Tokenizer failed, counting chars instead: {}", e);
                text.chars().count()
            }
        }
    }

    fn unit(&self) -> &'static str {
        "tokens"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_counter_counts_scalars_not_bytes() {
        assert_eq!(CharCounter.count("안녕"), 2);
        assert_eq!(CharCounter.count("hi"), 2);
        assert_eq!(CharCounter.count(""), 0);
    }

    #[test]
    fn missing_tokenizer_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(HfTokenCounter::from_file(&dir.path().join("tokenizer.json")).is_err());
    }
}
