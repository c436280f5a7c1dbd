use std::time::Duration;

use reqwest::{header::HeaderMap, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{api::types::ApiError, config, state::session::SessionGuard};

/// HTTP client for the backend API. The session guard is the only source of
/// the bearer token and is told to drop it whenever the server answers 401.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    session: SessionGuard,
    timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_session(SessionGuard::browser())
    }

    pub fn with_session(session: SessionGuard) -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            session,
            timeout: None,
        }
    }

    pub fn new_with_base_url(base_url: impl Into<String>, session: SessionGuard) -> Self {
        Self {
            client: Client::new(),
            base_url: Some(config::normalize_base_url(&base_url.into())),
            session,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn resolved_base_url(&self) -> String {
        if let Some(base) = &self.base_url {
            base.clone()
        } else {
            config::await_api_base_url().await
        }
    }

    pub(crate) async fn url(&self, path: &str) -> String {
        format!("{}{}", self.resolved_base_url().await, path)
    }

    /// Bearer header for the stored token. Fails without a request when the
    /// token is missing or already expired.
    pub(crate) fn get_auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let Some(token) = self.session.get_valid_token() else {
            if self.session.has_stored_token() {
                log::info!("Stored token expired; clearing session");
                self.session.clear_token();
            }
            return Err(ApiError::auth_required());
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .map_err(|_| ApiError::auth_required())?,
        );
        Ok(headers)
    }

    pub(crate) fn handle_unauthorized_status(&self, status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED {
            log::info!("Server rejected the session token; clearing it");
            self.session.clear_token();
        }
    }

    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let timeout = self.timeout.unwrap_or_else(config::request_timeout);
        let response = send_with_timeout(request, timeout).await?;
        self.handle_unauthorized_status(response.status());
        Ok(response)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            ApiError::invalid_response(format!("Failed to parse response: {}", e))
        })
    }

    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) if !error.code.is_empty() => error,
        _ => ApiError::from_status(status.as_u16()),
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn send_with_timeout(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Response, ApiError> {
    request.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::timeout(timeout)
        } else {
            ApiError::request_failed(format!("Request failed: {}", e))
        }
    })
}

#[cfg(target_arch = "wasm32")]
async fn send_with_timeout(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Response, ApiError> {
    use futures::future::{select, Either};
    use gloo_timers::future::TimeoutFuture;

    let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
    let send = Box::pin(request.send());
    match select(send, Box::pin(TimeoutFuture::new(millis))).await {
        Either::Left((result, _)) => {
            result.map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))
        }
        Either::Right(_) => Err(ApiError::timeout(timeout)),
    }
}
