//! Error types for the REST API client

use gov_api_contract::ProblemDetails;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when using the REST API client
#[derive(Debug, Error)]
pub enum RestClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned error status {status}: {body}")]
    Http {
        status: StatusCode,
        body: String,
        details: Option<ProblemDetails>,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("API contract error: {0}")]
    ApiContract(#[from] gov_api_contract::ApiContractError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    #[error("Stream aborted: {0}")]
    StreamAborted(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl RestClientError {
    /// Map a reqwest failure, keeping timeouts distinguishable
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }

    /// HTTP status of the response that caused this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Result type alias for REST client operations
pub type RestClientResult<T> = Result<T, RestClientError>;
