//! Prompt assembly under a size budget.

mod assembler;
mod counter;
mod template;

pub use assembler::{AssembledPrompt, PromptAssembler, PromptError};
pub use counter::{CharCounter, HfTokenCounter, TokenCounter};
pub use template::PromptTemplate;
