//! Application-level credential management.
//!
//! The backend authorizes the app itself separately from any signed-in user.
//! `AppTokenManager` exchanges the configured key/secret pair for a
//! short-lived token and renews it shortly before it expires. The token is
//! kept in memory only.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ApiError, ApiResult};

/// Path of the key/secret exchange endpoint, relative to the API base URL
pub const TOKEN_EXCHANGE_PATH: &str = "/auth/app-token";

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_SKEW_MINUTES: i64 = 5;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// Token
// ============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
    expires_at: DateTime<Utc>,
}

// Keep the token value out of logs.
impl fmt::Debug for ApplicationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl ApplicationToken {
    /// Build a token, or `None` if the lifetime does not fit in a timestamp.
    pub fn new(value: String, issued_at: DateTime<Utc>, expires_in_seconds: i64) -> Option<Self> {
        let expires_at = Duration::try_seconds(expires_in_seconds)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))?;
        Some(Self {
            value,
            issued_at,
            expires_in_seconds,
            expires_at,
        })
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable only while `now < expiry - skew`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::minutes(TOKEN_REFRESH_SKEW_MINUTES))
            .is_some_and(|deadline| now < deadline)
    }
}

/// The key/secret pair identifying this application to the backend.
#[derive(Clone, Serialize)]
pub struct AppCredentials {
    pub app_key: String,
    pub app_secret: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

// ============================================================================
// Manager
// ============================================================================

/// Owns the process-wide application token.
///
/// Created once by the composition root and shared by reference. Reads and
/// replacements of the held token never span an await point. Refreshes are
/// single-flight: callers that find the token stale queue on `refresh_gate`
/// and re-check before exchanging, so a burst of concurrent requests costs
/// one exchange.
pub struct AppTokenManager {
    client: Client,
    exchange_url: String,
    credentials: AppCredentials,
    timeout_secs: u64,
    clock: Arc<dyn Clock>,
    held: RwLock<Option<ApplicationToken>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AppTokenManager {
    pub fn new(
        client: Client,
        base_url: &str,
        credentials: AppCredentials,
        timeout_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            exchange_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_EXCHANGE_PATH),
            credentials,
            timeout_secs,
            clock,
            held: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the held token, usable or not
    pub fn current(&self) -> Option<ApplicationToken> {
        self.held.read().clone()
    }

    fn usable_value(&self) -> Option<String> {
        let now = self.clock.now();
        self.held
            .read()
            .as_ref()
            .filter(|t| t.is_usable_at(now))
            .map(|t| t.value.clone())
    }

    /// True if a usable token is held or a refresh just produced one.
    pub async fn ensure_valid_token(&self) -> bool {
        self.valid_token().await.is_some()
    }

    /// Return a usable token value, refreshing first if needed.
    ///
    /// The returned value is a capture: a later replacement does not affect
    /// a request that already holds it.
    pub async fn valid_token(&self) -> Option<String> {
        if let Some(value) = self.usable_value() {
            return Some(value);
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(value) = self.usable_value() {
            debug!("Application token refreshed by concurrent caller");
            return Some(value);
        }

        match self.refresh_token().await {
            Ok(token) => Some(token.value),
            Err(e) => {
                warn!(error = %e, "Failed to obtain application token");
                None
            }
        }
    }

    /// Exchange the key/secret pair for a new token and replace the held one.
    ///
    /// On failure the previously held token, if any, is left in place.
    pub async fn refresh_token(&self) -> Result<ApplicationToken, ApiError> {
        debug!(url = %self.exchange_url, "Requesting application token");

        let response = self
            .client
            .post(&self.exchange_url)
            .header(header::ACCEPT, "application/json")
            .json(&self.credentials)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout_secs))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %ApiError::truncate_body(&body), "Token exchange rejected");
            return Err(ApiError::from_status(status, &body));
        }

        let envelope: ApiResult<TokenGrant> = serde_json::from_str::<ApiResult<serde_json::Value>>(&body)
            .and_then(ApiResult::decode)
            .map_err(|e| ApiError::InvalidResponse(format!("token exchange: {}", e)))?;

        if !envelope.success {
            let envelope = envelope.normalized();
            warn!(message = envelope.display_message(), "Token exchange refused by server");
            return Err(ApiError::Rejected(envelope.display_message().to_string()));
        }

        let grant = envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse("token exchange returned no data".to_string()))?;

        if grant.token.is_empty() || grant.expires_in <= 0 {
            return Err(ApiError::InvalidResponse(
                "token exchange returned an empty or expired token".to_string(),
            ));
        }

        if let Some(kind) = grant.token_type.as_deref() {
            debug!(token_type = kind, "Application token type");
        }

        let token = ApplicationToken::new(grant.token, self.clock.now(), grant.expires_in).ok_or_else(|| {
            ApiError::InvalidResponse(format!(
                "token exchange returned an out-of-range lifetime ({}s)",
                grant.expires_in
            ))
        })?;

        *self.held.write() = Some(token.clone());
        info!(expires_in = token.expires_in_seconds, "Application token refreshed");

        Ok(token)
    }
}
