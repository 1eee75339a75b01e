//! Retrieval-augmented counselling chat service.
//!
//! A turn flows through [`chat::ChatOrchestrator`]: session history from
//! [`session`], passages from [`rag`], a bounded prompt from [`prompt`] and a
//! reply from the [`llm`] fallback chain. [`server`] exposes it over HTTP.

pub mod chat;
pub mod core;
pub mod llm;
pub mod prompt;
pub mod rag;
pub mod server;
pub mod session;
pub mod state;
