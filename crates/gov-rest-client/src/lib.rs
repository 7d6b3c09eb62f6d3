//! REST API client for the policy-governance service
//!
//! The client attaches the stored bearer token to every call and reacts to
//! an expired session exactly once: the credential is cleared and the user
//! is sent back to the login route, unless they are already there or the
//! failing call was the login itself.
//!
//! Streaming queries are read incrementally: [`sse::FrameDecoder`]
//! reassembles `data:` frames split across network reads,
//! [`dispatch::EventDispatcher`] routes the classified events to callbacks,
//! and [`conversation::Conversation`] carries the session id from one
//! question to the next.

pub mod auth;
pub mod client;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod navigation;
pub mod request;
pub mod sse;
pub mod stream;

pub use auth::*;
pub use client::*;
pub use config::*;
pub use conversation::Conversation;
pub use credentials::CredentialStore;
pub use dispatch::{EventDispatcher, EventHandlers, StreamState};
pub use error::*;
pub use navigation::{Navigator, RouteDecision, RouteState};
pub use request::{RequestBody, RequestDescriptor};
pub use stream::QueryStream;

use async_trait::async_trait;
use futures::StreamExt;
use gov_api_contract::*;
use gov_client_api::{ClientApi, ClientApiError, ClientApiResult, EventStream};

impl From<RestClientError> for ClientApiError {
    fn from(err: RestClientError) -> Self {
        match err {
            e if e.is_unauthorized() => ClientApiError::Unauthorized,
            RestClientError::StreamAborted(msg) => ClientApiError::Stream(msg),
            e @ (RestClientError::Http { .. }
            | RestClientError::Transport(_)
            | RestClientError::Timeout) => ClientApiError::Server(e.to_string()),
            e => ClientApiError::Unexpected(e.to_string()),
        }
    }
}

#[async_trait]
impl ClientApi for client::RestClient {
    async fn login(&self, username: &str, password: &str) -> ClientApiResult<Credential> {
        Ok(self.login(username, password).await?)
    }

    async fn logout(&self) -> ClientApiResult<()> {
        Ok(self.logout().await?)
    }

    async fn current_user(&self) -> ClientApiResult<UserProfile> {
        Ok(self.current_user().await?)
    }

    async fn query_policy(&self, question: &str) -> ClientApiResult<serde_json::Value> {
        Ok(self.query_policy(question).await?)
    }

    async fn query_stream(&self, request: &QueryRequest) -> ClientApiResult<EventStream> {
        let stream = self.open_query_stream(request).await?;
        Ok(stream
            .into_events()
            .map(|item| item.map_err(ClientApiError::from))
            .boxed())
    }
}
