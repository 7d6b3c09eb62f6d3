//! Client API trait for the governance front ends

use async_trait::async_trait;
use futures::stream::BoxStream;
use gov_api_contract::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientApiError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("server error: {0}")]
    Server(String),
    #[error("stream aborted: {0}")]
    Stream(String),
    #[error("unexpected: {0}")]
    Unexpected(String),
}

pub type ClientApiResult<T> = Result<T, ClientApiError>;

/// Events of one streaming query, in arrival order
pub type EventStream = BoxStream<'static, ClientApiResult<StreamEvent>>;

#[async_trait]
pub trait ClientApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> ClientApiResult<Credential>;

    async fn logout(&self) -> ClientApiResult<()>;

    async fn current_user(&self) -> ClientApiResult<UserProfile>;

    /// One-shot policy question, answered as a single JSON document
    async fn query_policy(&self, question: &str) -> ClientApiResult<serde_json::Value>;

    /// Open a streaming query; the stream ends after `done` or `error`
    async fn query_stream(&self, request: &QueryRequest) -> ClientApiResult<EventStream>;
}
