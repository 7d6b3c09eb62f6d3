//! Client configuration

use std::time::Duration;
use url::Url;

use crate::error::RestClientResult;

/// Default timeout for ordinary request/response calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path prefix under which the backend mounts its API
pub const API_PREFIX: &str = "/api/v1";

/// Configuration for [`crate::RestClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:8000`
    pub base_url: Url,
    /// Timeout for non-streaming calls; streaming calls are open-ended
    pub timeout: Duration,
    pub user_agent: String,
    /// Navigation entry point shown when the session is no longer valid
    pub login_route: String,
    /// Landing route for an already authenticated user
    pub home_route: String,
    /// API path of the login call, relative to [`API_PREFIX`]
    pub login_endpoint: String,
    /// API path of the streaming query call, relative to [`API_PREFIX`]
    pub stream_endpoint: String,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("gov-rest-client/", env!("CARGO_PKG_VERSION")).to_string(),
            login_route: "/login".to_string(),
            home_route: "/tasks".to_string(),
            login_endpoint: "/auth/login".to_string(),
            stream_endpoint: "/explanation/query/stream".to_string(),
        }
    }

    /// Create a config from a base URL string
    pub fn from_url(base_url: &str) -> RestClientResult<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn with_stream_endpoint(mut self, path: impl Into<String>) -> Self {
        self.stream_endpoint = path.into();
        self
    }

    /// Resolve an API path (e.g. `/auth/me`) to an absolute URL
    pub fn endpoint_url(&self, path: &str) -> RestClientResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let path = path.trim_start_matches('/');
        Ok(self.base_url.join(&format!("{}/{}", API_PREFIX, path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_url("http://localhost:8000").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.login_route, "/login");
        assert_eq!(config.login_endpoint, "/auth/login");
    }

    #[test]
    fn test_endpoint_url_joins_api_prefix() {
        let config = ClientConfig::from_url("http://localhost:8000").unwrap();
        assert_eq!(
            config.endpoint_url("/auth/me").unwrap().as_str(),
            "http://localhost:8000/api/v1/auth/me"
        );
        assert_eq!(
            config.endpoint_url("explanation/query").unwrap().as_str(),
            "http://localhost:8000/api/v1/explanation/query"
        );
    }

    #[test]
    fn test_endpoint_url_passes_absolute_urls() {
        let config = ClientConfig::from_url("http://localhost:8000").unwrap();
        assert_eq!(
            config.endpoint_url("https://other.example/x").unwrap().as_str(),
            "https://other.example/x"
        );
    }
}
