//! Request bodies as clients send them, normalised into one shape before
//! they reach the orchestrator.

use serde::Deserialize;
use thiserror::Error;

use crate::core::errors::ApiError;
use crate::session::{Role, Turn};

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("request must contain 'message' or 'messages'")]
    MissingMessage,
    #[error("'messages' contains no user message")]
    NoUserMessage,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message is {chars} characters, the limit is {max}")]
    TooLong { chars: usize, max: usize },
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// `POST /chat` body. Either a single `message` or a `messages` list,
/// keyed by `thread_id`, `nickname` or `user_id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<IncomingMessage>>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(alias = "message", alias = "text")]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput {
    Single(String),
    Conversation(Vec<(Role, String)>),
}

impl ChatInput {
    /// The message this turn answers: the single message, or the last user
    /// entry of a conversation.
    pub fn into_message(self) -> Result<String, InputError> {
        match self {
            ChatInput::Single(message) => Ok(message),
            ChatInput::Conversation(messages) => messages
                .into_iter()
                .rev()
                .find(|(role, _)| *role == Role::User)
                .map(|(_, content)| content)
                .ok_or(InputError::NoUserMessage),
        }
    }
}

/// A turn ready for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub session_key: String,
    pub message: String,
}

impl ChatRequest {
    pub fn input(&self) -> Result<ChatInput, InputError> {
        if let Some(message) = &self.message {
            return Ok(ChatInput::Single(message.clone()));
        }
        match &self.messages {
            Some(messages) => Ok(ChatInput::Conversation(
                messages
                    .iter()
                    .map(|m| (Role::parse(&m.role).unwrap_or(Role::User), m.content.clone()))
                    .collect(),
            )),
            None => Err(InputError::MissingMessage),
        }
    }

    pub fn normalize(self, default_key: &str) -> Result<TurnRequest, InputError> {
        let message = self.input()?.into_message()?;
        let session_key = resolve_session_key(
            [&self.thread_id, &self.nickname, &self.user_id],
            default_key,
        );
        Ok(TurnRequest {
            session_key,
            message,
        })
    }
}

/// First non-blank candidate, else `default_key`.
pub fn resolve_session_key(candidates: [&Option<String>; 3], default_key: &str) -> String {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|c| !c.is_empty())
        .unwrap_or(default_key)
        .to_string()
}

/// `POST /generate` body: one message answered without retrieval or memory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl GenerateRequest {
    pub fn message(&self) -> Result<String, InputError> {
        let message = self.message.as_deref().map(str::trim).unwrap_or_default();
        if message.is_empty() {
            return Err(InputError::EmptyMessage);
        }
        Ok(message.to_string())
    }
}

/// `POST /summary` body: a stored session, or an explicit message list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "messageList")]
    pub message_list: Option<Vec<ListedMessage>>,
}

/// A message as the client app stores it.
#[derive(Debug, Clone, Deserialize)]
pub struct ListedMessage {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "messageOrder")]
    pub message_order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummarySource {
    Session(String),
    Transcript(Vec<Turn>),
}

impl SummaryRequest {
    pub fn into_source(self, default_key: &str) -> SummarySource {
        match self.message_list {
            Some(mut list) => {
                list.sort_by_key(|m| m.message_order);
                SummarySource::Transcript(
                    list.into_iter()
                        .map(|m| {
                            let role = match m.sender.as_deref() {
                                None => Role::User,
                                Some(s) if s.eq_ignore_ascii_case("user") => Role::User,
                                Some(s) => Role::parse(s).unwrap_or(Role::Assistant),
                            };
                            Turn::new(role, m.message)
                        })
                        .collect(),
                )
            }
            None => SummarySource::Session(resolve_session_key(
                [&self.thread_id, &self.nickname, &self.user_id],
                default_key,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ChatRequest {
        serde_json::from_value(value).expect("request")
    }

    #[test]
    fn single_message_with_thread_id() {
        let req = parse(json!({"message": "안녕", "thread_id": "t1"}));
        assert_eq!(
            req.normalize("default").expect("normalize"),
            TurnRequest {
                session_key: "t1".to_string(),
                message: "안녕".to_string()
            }
        );
    }

    #[test]
    fn key_falls_back_through_nickname_to_default() {
        let req = parse(json!({"message": "hi", "thread_id": "  ", "nickname": "별"}));
        assert_eq!(req.normalize("default").expect("normalize").session_key, "별");

        let req = parse(json!({"message": "hi"}));
        assert_eq!(req.normalize("default").expect("normalize").session_key, "default");
    }

    #[test]
    fn conversation_uses_last_user_message() {
        let req = parse(json!({
            "thread_id": "t",
            "messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "second"},
                {"role": "assistant", "content": "trailing"}
            ]
        }));
        assert_eq!(req.normalize("d").expect("normalize").message, "second");
    }

    #[test]
    fn conversation_without_user_message_is_rejected() {
        let req = parse(json!({"messages": [{"role": "assistant", "content": "hi"}]}));
        assert_eq!(req.normalize("d"), Err(InputError::NoUserMessage));
    }

    #[test]
    fn missing_message_is_rejected() {
        assert_eq!(
            parse(json!({"thread_id": "t"})).normalize("d"),
            Err(InputError::MissingMessage)
        );
    }

    #[test]
    fn empty_message_is_still_a_valid_request() {
        let req = parse(json!({"message": ""}));
        assert_eq!(req.normalize("d").expect("normalize").message, "");
    }

    #[test]
    fn message_list_is_ordered_and_mapped_to_roles() {
        let req: SummaryRequest = serde_json::from_value(json!({
            "messageList": [
                {"sender": "AI", "message": "b", "messageOrder": 2},
                {"sender": "USER", "message": "a", "messageOrder": 1}
            ]
        }))
        .expect("request");

        match req.into_source("d") {
            SummarySource::Transcript(turns) => {
                assert_eq!(turns[0].content, "a");
                assert_eq!(turns[0].role, Role::User);
                assert_eq!(turns[1].role, Role::Assistant);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn summary_without_list_targets_a_session() {
        let req: SummaryRequest = serde_json::from_value(json!({"user_id": "u9"})).expect("request");
        assert_eq!(req.into_source("d"), SummarySource::Session("u9".to_string()));
    }

    #[test]
    fn generate_request_trims_and_rejects_blank() {
        let req: GenerateRequest =
            serde_json::from_value(json!({"message": "  안녕하세요 ", "thread_id": "t"})).expect("request");
        assert_eq!(req.message().expect("message"), "안녕하세요");

        let req: GenerateRequest = serde_json::from_value(json!({"message": "   "})).expect("request");
        assert_eq!(req.message(), Err(InputError::EmptyMessage));

        let req: GenerateRequest = serde_json::from_value(json!({})).expect("request");
        assert_eq!(req.message(), Err(InputError::EmptyMessage));
    }
}
