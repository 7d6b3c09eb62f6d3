//! Bearer authentication and authentication-failure handling

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{RestClientError, RestClientResult};
use crate::navigation::Navigator;

/// Add `Authorization: Bearer <token>` unless the caller already set one
pub fn apply_bearer(headers: &mut HeaderMap, token: Option<&str>) -> RestClientResult<()> {
    if headers.contains_key(AUTHORIZATION) {
        debug!("Keeping caller-supplied Authorization header");
        return Ok(());
    }
    match token {
        Some(token) => {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RestClientError::Auth(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        None => {
            // Public endpoints are sent as-is
        }
    }
    Ok(())
}

/// What to do about a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureAction {
    NoOp,
    ClearAndRedirect,
}

/// Whether `request_path` targets the login call
pub fn is_login_request(request_path: &str, login_endpoint: &str) -> bool {
    request_path.contains(login_endpoint)
}

/// Decide how to react to a response.
///
/// Only a 401 acts, and never while the user is already on the login route
/// or when the failing request was the login call itself.
pub fn auth_failure_action(
    current_path: &str,
    request_path: &str,
    status: StatusCode,
    login_route: &str,
    login_endpoint: &str,
) -> AuthFailureAction {
    if status != StatusCode::UNAUTHORIZED {
        return AuthFailureAction::NoOp;
    }
    let on_login_page = current_path == login_route;
    let login_request = is_login_request(request_path, login_endpoint);
    if on_login_page || login_request {
        AuthFailureAction::NoOp
    } else {
        AuthFailureAction::ClearAndRedirect
    }
}

/// Applies [`auth_failure_action`] against the shared credential store and navigator
pub struct AuthFailureHandler {
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    login_endpoint: String,
    gate: Mutex<()>,
}

impl AuthFailureHandler {
    pub fn new(
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
        login_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            navigator,
            login_route: login_route.into(),
            login_endpoint: login_endpoint.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// React to a response status for the request at `request_path`.
    ///
    /// Decision and side effects run under one lock, so concurrent failures
    /// clear and redirect at most once: the first one moves the user onto
    /// the login route and every later one sees that and does nothing.
    pub async fn handle(&self, request_path: &str, status: StatusCode) -> AuthFailureAction {
        if status != StatusCode::UNAUTHORIZED {
            return AuthFailureAction::NoOp;
        }
        let _guard = self.gate.lock().await;
        let current_path = self.navigator.current_path();
        let action = auth_failure_action(
            &current_path,
            request_path,
            status,
            &self.login_route,
            &self.login_endpoint,
        );
        match action {
            AuthFailureAction::ClearAndRedirect => {
                info!(
                    "Request to {} was unauthorized, clearing credential and redirecting to {}",
                    request_path, self.login_route
                );
                if let Err(e) = self.credentials.clear().await {
                    warn!("Failed to clear stored credential: {}", e);
                }
                self.navigator.navigate(&self.login_route);
            }
            AuthFailureAction::NoOp => {
                debug!(
                    "Unauthorized response for {} left untouched (current path {})",
                    request_path, current_path
                );
            }
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::RouteState;
    use gov_api_contract::{Credential, UserProfile};

    fn credential() -> Credential {
        Credential {
            token: "jwt-token".into(),
            user: UserProfile {
                username: "reviewer".into(),
                full_name: None,
                email: None,
                role: None,
            },
        }
    }

    #[test]
    fn test_bearer_header_added() {
        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, Some("jwt-token")).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer jwt-token");
    }

    #[test]
    fn test_no_token_leaves_headers_alone() {
        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, None).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_caller_authorization_not_overwritten() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer explicit"));
        apply_bearer(&mut headers, Some("stored")).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer explicit");
    }

    #[test]
    fn test_invalid_token_is_auth_error() {
        let mut headers = HeaderMap::new();
        let result = apply_bearer(&mut headers, Some("bad\ntoken"));
        assert!(matches!(result, Err(RestClientError::Auth(_))));
    }

    #[test]
    fn test_action_table() {
        let unauthorized = StatusCode::UNAUTHORIZED;
        let action = |current, request, status| {
            auth_failure_action(current, request, status, "/login", "/auth/login")
        };

        assert_eq!(
            action("/tasks", "/policies", unauthorized),
            AuthFailureAction::ClearAndRedirect
        );
        assert_eq!(action("/login", "/policies", unauthorized), AuthFailureAction::NoOp);
        assert_eq!(action("/tasks", "/auth/login", unauthorized), AuthFailureAction::NoOp);
        assert_eq!(
            action("/tasks", "/api/v1/auth/login", unauthorized),
            AuthFailureAction::NoOp
        );
        assert_eq!(action("/tasks", "/policies", StatusCode::FORBIDDEN), AuthFailureAction::NoOp);
        assert_eq!(
            action("/tasks", "/policies", StatusCode::INTERNAL_SERVER_ERROR),
            AuthFailureAction::NoOp
        );
    }

    #[tokio::test]
    async fn test_handler_on_login_page_is_noop() {
        let store = CredentialStore::in_memory();
        store.login(credential()).await.unwrap();
        let routes = Arc::new(RouteState::new("/login"));
        let handler = AuthFailureHandler::new(store.clone(), routes.clone(), "/login", "/auth/login");

        let action = handler.handle("/policies", StatusCode::UNAUTHORIZED).await;

        assert_eq!(action, AuthFailureAction::NoOp);
        assert!(store.is_authenticated().await);
        assert_eq!(routes.navigation_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_token() {
        let store = CredentialStore::in_memory();
        store.login(credential()).await.unwrap();
        let routes = Arc::new(RouteState::new("/tasks"));
        let handler = AuthFailureHandler::new(store.clone(), routes.clone(), "/login", "/auth/login");

        handler.handle("/auth/login", StatusCode::UNAUTHORIZED).await;

        assert_eq!(store.token().await.as_deref(), Some("jwt-token"));
        assert_eq!(routes.current_path(), "/tasks");
    }

    #[tokio::test]
    async fn test_concurrent_failures_redirect_once() {
        let store = CredentialStore::in_memory();
        store.login(credential()).await.unwrap();
        let routes = Arc::new(RouteState::new("/tasks"));
        let handler = Arc::new(AuthFailureHandler::new(
            store.clone(),
            routes.clone(),
            "/login",
            "/auth/login",
        ));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                handler
                    .handle(&format!("/policies/{}", i), StatusCode::UNAUTHORIZED)
                    .await
            }));
        }
        let mut redirects = 0;
        for task in tasks {
            if task.await.unwrap() == AuthFailureAction::ClearAndRedirect {
                redirects += 1;
            }
        }

        assert_eq!(redirects, 1);
        assert_eq!(routes.navigation_count(), 1);
        assert_eq!(routes.current_path(), "/login");
        assert!(!store.is_authenticated().await);
    }
}
