//! Request validation helpers

use crate::error::ApiContractError;
use crate::types::*;
use validator::Validate;

/// Validate a streaming query request
pub fn validate_query_request(request: &QueryRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query_request_valid() {
        let request = QueryRequest::new("Which rules apply to outpatients?", Some("s-1".into()));
        assert!(validate_query_request(&request).is_ok());
    }

    #[test]
    fn test_validate_query_request_empty_question() {
        let request = QueryRequest::new("", None);
        assert!(matches!(
            validate_query_request(&request),
            Err(ApiContractError::Validation(_))
        ));
    }
}
