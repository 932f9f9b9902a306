//! REST API client module for the Wellspring backend.
//!
//! Every call is authorized twice over: an application token identifies the
//! app itself and is obtained and renewed automatically by
//! `AppTokenManager`, while a user bearer token is supplied by the caller
//! for endpoints tied to a signed-in user. All calls resolve to an
//! `ApiResult`; nothing in this module returns a raw transport error.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod result;
pub mod token;

pub use client::{ApiClient, ClientSettings, APP_TOKEN_HEADER, DEVICE_ID_HEADER};
pub use endpoints::ProductQuery;
pub use error::ApiError;
pub use result::{ApiResult, Meta, Pagination};
pub use token::{AppCredentials, AppTokenManager, ApplicationToken, Clock, ManualClock, SystemClock};
