//! Wellspring core - the API access layer behind the donation storefront.
//!
//! - [`api`]: `ApiClient`, application-token management and typed endpoints
//! - [`auth`]: the signed-in user's session and its persistent store
//! - [`config`]: environment selection and application credentials
//! - [`models`]: products, cart, profile and payment types
//! - [`i18n`]: Arabic/English language selection

pub mod api;
pub mod auth;
pub mod config;
pub mod i18n;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiResult};
pub use auth::{CredentialStore, FileStore, KeyringStore, SessionManager, UserSession};
pub use config::{Config, Environment};
pub use i18n::Language;
