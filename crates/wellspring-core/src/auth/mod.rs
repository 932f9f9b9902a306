//! Authentication module for the signed-in user's session.
//!
//! This module provides:
//! - `CredentialStore`: persistent key-value storage, backed by a JSON file
//!   (`FileStore`) or the OS keychain (`KeyringStore`)
//! - `SessionManager`: the user's bearer token and profile, the guest-mode
//!   flag, the language preference and the device id
//!
//! The application token is not stored here; it lives in memory inside the
//! API client.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, FileStore, KeyringStore};
pub use session::{SessionManager, UserSession};
