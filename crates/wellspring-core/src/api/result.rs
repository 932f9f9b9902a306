//! The normalized response envelope every API call resolves to.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;

/// Shown when a failure carries neither an error nor a message.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// `{ success, data, error, message }` as sent by the server, plus the
/// optional `meta` block list endpoints attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub success: bool,
    // A bare `default` would require `T: Default`
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    /// HTTP status of the response this result came from, if one was received
    #[serde(skip)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub count: u32,
}

impl Pagination {
    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            meta: None,
            status: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            meta: None,
            status: None,
        }
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Enforce the envelope invariants on a body the server produced.
    ///
    /// A successful result never carries an error, a failed one never
    /// carries data, and a failure always has some displayable text.
    pub fn normalized(mut self) -> Self {
        if self.success {
            self.error = None;
        } else {
            self.data = None;
            if self.error.is_none() && self.message.is_none() {
                self.error = Some(GENERIC_FAILURE.to_string());
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// True when the server rejected the user's bearer token
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.meta.as_ref().and_then(|m| m.pagination.as_ref())
    }

    /// Text suitable for showing to the user as-is.
    pub fn display_message(&self) -> &str {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or(GENERIC_FAILURE)
    }

    /// Consume the result, yielding the payload only when the call succeeded.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }

    /// Change the payload type, keeping the rest of the envelope.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        ApiResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            message: self.message,
            meta: self.meta,
            status: self.status,
        }
    }
}

impl ApiResult<Value> {
    /// Decode the payload into `T`.
    ///
    /// Data on a failed envelope is discarded without being decoded, so a
    /// failure whose partial data has an unexpected shape still surfaces the
    /// server's message.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResult<T>, serde_json::Error> {
        let data = match self.data {
            Some(value) if self.success => Some(serde_json::from_value(value)?),
            _ => None,
        };
        Ok(ApiResult {
            success: self.success,
            data,
            error: self.error,
            message: self.message,
            meta: self.meta,
            status: self.status,
        })
    }
}

impl<T> From<ApiError> for ApiResult<T> {
    fn from(err: ApiError) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let mut result = ApiResult::failure(err.to_string());
        result.status = status;
        result
    }
}
