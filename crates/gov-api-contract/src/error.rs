//! Error types for API contract validation and parsing

use thiserror::Error;

/// Errors that can occur during API contract validation and parsing
#[derive(Debug, Error)]
pub enum ApiContractError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid event kind: {0}")]
    InvalidEventKind(String),
}

/// Error body returned by the backend on non-2xx responses.
///
/// The backend reports `{"detail": ...}` where `detail` is either a message
/// string or a list of field errors, so it is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProblemDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl ProblemDetails {
    /// Human readable message, when the detail is a plain string
    pub fn message(&self) -> Option<&str> {
        self.detail.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_details_string_detail() {
        let problem: ProblemDetails =
            serde_json::from_str(r#"{"detail":"Incorrect username or password"}"#).unwrap();
        assert_eq!(problem.message(), Some("Incorrect username or password"));
        assert!(problem.title.is_none());
    }

    #[test]
    fn test_problem_details_structured_detail() {
        let problem: ProblemDetails =
            serde_json::from_str(r#"{"detail":[{"loc":["body","question"],"msg":"field required"}]}"#)
                .unwrap();
        assert!(problem.message().is_none());
        assert!(problem.detail.is_array());
    }
}
