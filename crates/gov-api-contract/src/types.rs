//! API contract types for the policy-governance REST service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::ApiContractError;

/// Profile of the authenticated user as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Response of `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: UserProfile,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Bearer token plus the profile it was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub user: UserProfile,
}

impl From<LoginResponse> for Credential {
    fn from(response: LoginResponse) -> Self {
        Self {
            token: response.access_token,
            user: response.user,
        }
    }
}

/// Body of the streaming query request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1))]
    pub question: String,
    /// `None` asks the backend to allocate a new conversation
    pub session_id: Option<String>,
    pub use_history: bool,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            question: question.into(),
            session_id,
            use_history: true,
        }
    }
}

/// Event kinds carried in the `type` field of a stream frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Metadata,
    ThinkingStart,
    Thinking,
    ThinkingDone,
    AnswerStart,
    Chunk,
    Done,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Metadata,
        EventKind::ThinkingStart,
        EventKind::Thinking,
        EventKind::ThinkingDone,
        EventKind::AnswerStart,
        EventKind::Chunk,
        EventKind::Done,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Metadata => "metadata",
            EventKind::ThinkingStart => "thinking_start",
            EventKind::Thinking => "thinking",
            EventKind::ThinkingDone => "thinking_done",
            EventKind::AnswerStart => "answer_start",
            EventKind::Chunk => "chunk",
            EventKind::Done => "done",
            EventKind::Error => "error",
        }
    }

    /// No further events follow a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Done | EventKind::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ApiContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ApiContractError::InvalidEventKind(s.to_string()))
    }
}

/// A classified stream frame: its kind and the full JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl StreamEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Build a locally synthesized `error` event
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: EventKind::Error,
            payload: serde_json::json!({ "type": "error", "message": message }),
        }
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(|v| v.as_str())
    }

    /// Text content of `thinking` and `chunk` events
    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    /// Session id announced by `metadata` or confirmed by `done`
    pub fn session_id(&self) -> Option<&str> {
        self.str_field("session_id")
    }

    /// Message of an `error` event
    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trips_through_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("tool_call".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_terminal_kinds() {
        let terminal: Vec<_> = EventKind::ALL.into_iter().filter(|k| k.is_terminal()).collect();
        assert_eq!(terminal, vec![EventKind::Done, EventKind::Error]);
    }

    #[test]
    fn test_query_request_serializes_null_session() {
        let request = QueryRequest::new("What is policy 7?", None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"question": "What is policy 7?", "session_id": null, "use_history": true})
        );
    }

    #[test]
    fn test_login_response_into_credential() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","user":{"username":"admin","full_name":"Admin","role":"admin"}}"#,
        )
        .unwrap();
        let credential = Credential::from(response);
        assert_eq!(credential.token, "abc");
        assert_eq!(credential.user.username, "admin");
        assert_eq!(credential.user.role.as_deref(), Some("admin"));
        assert!(credential.user.email.is_none());
    }

    #[test]
    fn test_stream_event_accessors() {
        let event = StreamEvent::new(
            EventKind::Done,
            serde_json::json!({"type": "done", "session_id": "s-1", "sources": []}),
        );
        assert_eq!(event.session_id(), Some("s-1"));
        assert!(event.content().is_none());
        assert!(event.is_terminal());

        let error = StreamEvent::error("backend exploded");
        assert_eq!(error.kind, EventKind::Error);
        assert_eq!(error.message(), Some("backend exploded"));
    }
}
