//! One conversational turn end to end, plus the session summary report.

mod input;
mod orchestrator;
mod safety;
mod summary;

pub use input::{
    resolve_session_key, ChatInput, ChatRequest, GenerateRequest, IncomingMessage, InputError, ListedMessage,
    SummaryRequest, SummarySource, TurnRequest,
};
pub use orchestrator::{ChatOrchestrator, TurnError, TurnReply, TurnSettings};
pub use safety::CrisisDetector;
pub use summary::{SummaryReport, SummaryService};
