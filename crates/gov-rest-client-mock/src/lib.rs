//! Mock governance client backed by scripted event streams
//!
//! Streams are replayed as raw text-event-stream bytes cut into small
//! chunks, so they travel through the same frame reassembly as live
//! responses.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use gov_api_contract::*;
use gov_client_api::{ClientApi, ClientApiError, ClientApiResult, EventStream};
use gov_rest_client::stream::{ByteStream, QueryStream};
use std::sync::Mutex;
use tracing::debug;

pub struct MockClient {
    credential: Mutex<Option<Credential>>,
    requests: Mutex<Vec<QueryRequest>>,
    chunk_size: usize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            credential: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            chunk_size: 7,
        }
    }

    /// Replay stream bodies in chunks of `size` bytes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Streaming requests received so far
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn is_authenticated(&self) -> bool {
        self.credential
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Body the scripted backend sends for `request`
    pub fn script(request: &QueryRequest) -> String {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let frames = [
            serde_json::json!({"type": "metadata", "session_id": session_id}),
            serde_json::json!({"type": "thinking_start"}),
            serde_json::json!({"type": "thinking", "content": "Searching policy documents"}),
            serde_json::json!({"type": "thinking_done"}),
            serde_json::json!({"type": "answer_start"}),
            serde_json::json!({"type": "chunk", "content": "You asked: "}),
            serde_json::json!({"type": "chunk", "content": request.question}),
            serde_json::json!({"type": "done", "session_id": session_id}),
        ];
        frames
            .iter()
            .map(|frame| format!("data: {}\n\n", frame))
            .collect()
    }

    fn chunked(&self, body: String) -> ByteStream {
        let chunks: Vec<_> = body
            .into_bytes()
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        futures::stream::iter(chunks).boxed()
    }
}

#[async_trait]
impl ClientApi for MockClient {
    async fn login(&self, username: &str, _password: &str) -> ClientApiResult<Credential> {
        let credential = Credential {
            token: format!("mock-token-{}", username),
            user: UserProfile {
                username: username.to_string(),
                full_name: None,
                email: None,
                role: Some("admin".into()),
            },
        };
        *self.credential.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.clone());
        Ok(credential)
    }

    async fn logout(&self) -> ClientApiResult<()> {
        *self.credential.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    async fn current_user(&self) -> ClientApiResult<UserProfile> {
        self.credential
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|c| c.user.clone())
            .ok_or(ClientApiError::Unauthorized)
    }

    async fn query_policy(&self, question: &str) -> ClientApiResult<serde_json::Value> {
        Ok(serde_json::json!({ "question": question, "answer": "mock answer" }))
    }

    async fn query_stream(&self, request: &QueryRequest) -> ClientApiResult<EventStream> {
        if !self.is_authenticated() {
            return Err(ClientApiError::Unauthorized);
        }
        validation::validate_query_request(request)
            .map_err(|e| ClientApiError::Unexpected(e.to_string()))?;
        debug!("Mock streaming answer for {:?}", request.question);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let body = self.chunked(Self::script(request));
        Ok(QueryStream::new(body)
            .into_events()
            .map(|item| item.map_err(ClientApiError::from))
            .boxed())
    }
}
