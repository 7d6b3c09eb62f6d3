//! Authenticated REST client

use gov_api_contract::*;
use reqwest::header::ACCEPT;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::{apply_bearer, AuthFailureHandler};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{RestClientError, RestClientResult};
use crate::navigation::{Navigator, RouteState};
use crate::request::{RequestBody, RequestDescriptor};
use crate::stream::QueryStream;

/// REST client for the governance backend
#[derive(Clone)]
pub struct RestClient {
    http_client: HttpClient,
    config: Arc<ClientConfig>,
    credentials: CredentialStore,
    auth_failures: Arc<AuthFailureHandler>,
}

impl RestClient {
    /// Create a new REST client
    pub fn new(
        config: ClientConfig,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> RestClientResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        let auth_failures = Arc::new(AuthFailureHandler::new(
            credentials.clone(),
            navigator,
            config.login_route.clone(),
            config.login_endpoint.clone(),
        ));

        Ok(Self {
            http_client,
            config: Arc::new(config),
            credentials,
            auth_failures,
        })
    }

    /// Create a client from a base URL string with in-process navigation state
    pub fn from_url(base_url: &str, credentials: CredentialStore) -> RestClientResult<Self> {
        let config = ClientConfig::from_url(base_url)?;
        let navigator = Arc::new(RouteState::default());
        Self::new(config, credentials, navigator)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        self.auth_failures.navigator()
    }

    /// Send an ordinary request, bounded by the configured timeout
    pub async fn send(&self, request: RequestDescriptor) -> RestClientResult<Response> {
        self.execute(request, Some(self.config.timeout)).await
    }

    /// Send a request and decode its JSON response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> RestClientResult<T> {
        let response = self.send(request).await?;
        let text = response.text().await.map_err(RestClientError::from_transport)?;
        serde_json::from_str(&text).map_err(RestClientError::from)
    }

    /// Log in with username and password, storing the issued credential
    pub async fn login(&self, username: &str, password: &str) -> RestClientResult<Credential> {
        let request = RequestDescriptor::post(self.config.login_endpoint.as_str())
            .form([("username", username), ("password", password)]);
        let response: LoginResponse = self.send_json(request).await?;
        let credential = Credential::from(response);
        self.credentials.login(credential.clone()).await?;
        info!("Logged in as {}", credential.user.username);
        Ok(credential)
    }

    pub async fn logout(&self) -> RestClientResult<()> {
        self.credentials.logout().await
    }

    pub async fn current_user(&self) -> RestClientResult<UserProfile> {
        self.send_json(RequestDescriptor::get("/auth/me")).await
    }

    /// One-shot policy question
    pub async fn query_policy(&self, question: &str) -> RestClientResult<serde_json::Value> {
        let request = RequestDescriptor::post("/explanation/query").query("question", question);
        self.send_json(request).await
    }

    /// Start a streaming query, continuing `session_id` when given
    pub async fn start_query(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> RestClientResult<QueryStream> {
        let request = QueryRequest::new(question, session_id.map(str::to_string));
        self.open_query_stream(&request).await
    }

    /// Open the event stream for a prepared query request.
    ///
    /// The token is read once here; a later login or logout does not affect
    /// an already open stream.
    pub async fn open_query_stream(&self, request: &QueryRequest) -> RestClientResult<QueryStream> {
        validation::validate_query_request(request)?;
        debug!(
            "Opening query stream (session {})",
            request.session_id.as_deref().unwrap_or("new")
        );
        let descriptor = RequestDescriptor::post(self.config.stream_endpoint.as_str())
            .json(request)?
            .header(ACCEPT.as_str(), "text/event-stream")?;
        let response = self.execute(descriptor, None).await?;
        Ok(QueryStream::from_response(response))
    }

    async fn execute(
        &self,
        request: RequestDescriptor,
        timeout: Option<Duration>,
    ) -> RestClientResult<Response> {
        let url = self.config.endpoint_url(request.path())?;

        let token = self.credentials.token().await;
        if token.is_none() {
            debug!("No credential available for {}", request.path());
        }
        let mut headers = request.headers().clone();
        apply_bearer(&mut headers, token.as_deref())?;

        let mut builder = self
            .http_client
            .request(request.method().clone(), url)
            .headers(headers);
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        debug!(
            "{} {} (authenticated: {})",
            request.method(),
            request.path(),
            token.is_some()
        );
        let response = builder.send().await.map_err(RestClientError::from_transport)?;
        self.handle_status(&request, response).await
    }

    async fn handle_status(
        &self,
        request: &RequestDescriptor,
        response: Response,
    ) -> RestClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        self.auth_failures.handle(request.path(), status).await;

        let body = response.text().await.unwrap_or_default();
        let details = serde_json::from_str::<ProblemDetails>(&body).ok();
        debug!("{} {} failed with {}", request.method(), request.path(), status);
        Err(RestClientError::Http {
            status,
            body,
            details,
        })
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}
