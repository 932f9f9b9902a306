//! API client for communicating with the Wellspring REST API.
//!
//! This module provides the `ApiClient` struct: it composes the request
//! headers (fixed headers, caller headers, application token), performs a
//! single HTTP attempt, and folds every outcome into an [`ApiResult`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::i18n::Language;

use super::token::{AppCredentials, AppTokenManager, Clock, SystemClock};
use super::{ApiError, ApiResult};

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the application token
pub const APP_TOKEN_HEADER: &str = "x-app-token";

/// Header carrying the installation's device identifier
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Everything needed to construct an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub credentials: AppCredentials,
    pub timeout: Duration,
    pub device_id: String,
    pub language: Language,
}

/// API client for the Wellspring backend.
/// Clone is cheap and clones share the connection pool, the application
/// token and the active language.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    device_id: HeaderValue,
    language: Arc<RwLock<Language>>,
    timeout_secs: u64,
    tokens: Arc<AppTokenManager>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a client whose token expiry checks read time from `clock`
    pub fn with_clock(settings: ClientSettings, clock: Arc<dyn Clock>) -> Result<Self, ApiError> {
        if settings.credentials.app_key.is_empty() || settings.credentials.app_secret.is_empty() {
            return Err(ApiError::Client("application key and secret are required".to_string()));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        let device_id = HeaderValue::from_str(&settings.device_id)
            .map_err(|_| ApiError::InvalidHeader(DEVICE_ID_HEADER))?;

        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let timeout_secs = settings.timeout.as_secs().max(1);

        let tokens = AppTokenManager::new(
            client.clone(), // Cheap clone, shares connection pool
            &base_url,
            settings.credentials,
            timeout_secs,
            clock,
        );

        Ok(Self {
            client,
            base_url,
            device_id,
            language: Arc::new(RwLock::new(settings.language)),
            timeout_secs,
            tokens: Arc::new(tokens),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &AppTokenManager {
        &self.tokens
    }

    pub fn language(&self) -> Language {
        *self.language.read()
    }

    /// Switch the locale sent with subsequent requests
    pub fn set_language(&self, language: Language) {
        *self.language.write() = language;
    }

    /// Build the caller-owned `Authorization: Bearer` header for a user token
    pub fn bearer(token: &str) -> Result<HeaderMap, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidHeader("authorization"))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Compose the final header set for one request.
    ///
    /// Fixed headers first, then caller headers (which may replace them),
    /// then the application token, which callers cannot clobber.
    pub fn compose_headers(
        &self,
        extra_headers: Option<HeaderMap>,
        app_token: Option<&str>,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(self.language().code()),
        );
        headers.insert(HeaderName::from_static(DEVICE_ID_HEADER), self.device_id.clone());

        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        if let Some(token) = app_token {
            let mut value = HeaderValue::from_str(token)
                .map_err(|_| ApiError::InvalidHeader(APP_TOKEN_HEADER))?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(APP_TOKEN_HEADER), value);
        }

        Ok(headers)
    }

    /// Perform one request and normalize the outcome.
    ///
    /// Never fails: credential, transport, server and parse failures all come
    /// back as an `ApiResult` with `success == false`. For `GET` the payload
    /// is sent as query parameters, otherwise as the JSON body.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
        requires_app_token: bool,
    ) -> ApiResult<T> {
        match self
            .try_execute(endpoint, method.clone(), body, extra_headers, requires_app_token)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(%method, endpoint, error = %e, "API request failed");
                e.into()
            }
        }
    }

    async fn try_execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
        requires_app_token: bool,
    ) -> Result<ApiResult<T>, ApiError> {
        let app_token = if requires_app_token {
            Some(
                self.tokens
                    .valid_token()
                    .await
                    .ok_or(ApiError::CredentialUnavailable)?,
            )
        } else {
            None
        };

        let headers = self.compose_headers(extra_headers, app_token.as_deref())?;
        let url = self.url(endpoint);
        debug!(%method, url = %url, "Sending request");

        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if let Some(ref payload) = body {
            request = if method == Method::GET {
                request.query(payload)
            } else {
                request.json(payload)
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout_secs))?;

        if !status.is_success() {
            warn!(
                %method,
                endpoint,
                status = status.as_u16(),
                body = %ApiError::truncate_body(&text),
                "Server returned an error status"
            );
            return Err(ApiError::from_status(status, &text));
        }

        let envelope: ApiResult<T> = serde_json::from_str::<ApiResult<Value>>(&text)
            .and_then(ApiResult::decode)
            .map_err(|e| {
                ApiError::InvalidResponse(format!("could not parse response from {}: {}", endpoint, e))
            })?;

        Ok(envelope.normalized().with_status(status.as_u16()))
    }

    // ===== Convenience Methods =====
    // All of these require the application token. Argument order is
    // (endpoint, data, headers).

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> ApiResult<T> {
        self.execute(endpoint, Method::GET, params, headers, true).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> ApiResult<T> {
        self.execute(endpoint, Method::POST, data, headers, true).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> ApiResult<T> {
        self.execute(endpoint, Method::PUT, data, headers, true).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> ApiResult<T> {
        self.execute(endpoint, Method::DELETE, data, headers, true).await
    }
}
