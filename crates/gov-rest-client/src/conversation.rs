//! Multi-turn conversations
//!
//! A [`Conversation`] is owned by the caller. It remembers the session id the
//! backend announced and sends it with the next question; nothing is kept in
//! global state, so several conversations can run side by side.

use gov_api_contract::{EventKind, QueryRequest, StreamEvent};
use gov_client_api::{ClientApi, ClientApiResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::{drive_events, EventDispatcher, StreamState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    session_id: Option<String>,
    history_enabled: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Start a new conversation; the backend allocates its id
    pub fn new() -> Self {
        Self {
            session_id: None,
            history_enabled: true,
        }
    }

    /// Continue a conversation whose id the caller saved earlier
    pub fn resume(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            history_enabled: true,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn history_enabled(&self) -> bool {
        self.history_enabled
    }

    /// Request body for the next question in this conversation
    pub fn request(&self, question: impl Into<String>) -> QueryRequest {
        QueryRequest {
            question: question.into(),
            session_id: self.session_id.clone(),
            use_history: self.history_enabled,
        }
    }

    /// Pick up the session id from `metadata` and `done` events.
    /// Returns whether the id changed.
    pub fn observe(&mut self, event: &StreamEvent) -> bool {
        if !matches!(event.kind, EventKind::Metadata | EventKind::Done) {
            return false;
        }
        match event.session_id() {
            Some(id) if self.session_id.as_deref() != Some(id) => {
                debug!("Conversation session is now {}", id);
                self.session_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Ask `question` and stream the answer through `dispatcher`
    pub async fn ask<C>(
        &mut self,
        api: &C,
        question: &str,
        dispatcher: &mut EventDispatcher,
        cancel: &CancellationToken,
    ) -> ClientApiResult<StreamState>
    where
        C: ClientApi + ?Sized,
    {
        let request = self.request(question);
        let events = api.query_stream(&request).await?;
        let state = drive_events(events, dispatcher, cancel, |event| {
            self.observe(event);
        })
        .await;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_conversation_requests_allocation() {
        let conversation = Conversation::new();
        let request = conversation.request("What is covered?");
        assert_eq!(request.session_id, None);
        assert!(request.use_history);
    }

    #[test]
    fn test_observe_metadata_and_done() {
        let mut conversation = Conversation::new();

        let chunk = StreamEvent::new(EventKind::Chunk, json!({"type": "chunk", "session_id": "x"}));
        assert!(!conversation.observe(&chunk));
        assert_eq!(conversation.session_id(), None);

        let metadata =
            StreamEvent::new(EventKind::Metadata, json!({"type": "metadata", "session_id": "s-1"}));
        assert!(conversation.observe(&metadata));
        assert_eq!(conversation.session_id(), Some("s-1"));

        let done = StreamEvent::new(EventKind::Done, json!({"type": "done", "session_id": "s-1"}));
        assert!(!conversation.observe(&done));
    }

    #[test]
    fn test_resumed_requests_share_session() {
        let conversation = Conversation::resume("s-7");
        let first = conversation.request("first");
        let second = conversation.request("second");
        assert_eq!(first.session_id.as_deref(), Some("s-7"));
        assert_eq!(second.session_id, first.session_id);
        assert!(first.use_history && second.use_history);
    }
}
