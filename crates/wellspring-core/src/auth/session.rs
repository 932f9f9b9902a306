use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::i18n::Language;
use crate::models::{AuthPayload, UserProfile};

use super::CredentialStore;

/// Store keys. Fixed so that state survives upgrades.
pub const USER_TOKEN_KEY: &str = "userToken";
pub const USER_DATA_KEY: &str = "userData";
pub const SKIP_LOGIN_KEY: &str = "skipLogin";
pub const LANGUAGE_KEY: &str = "appLanguage";
pub const DEVICE_ID_KEY: &str = "deviceId";

/// A signed-in user as persisted on this device.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub token: String,
    pub user: UserProfile,
    pub skip_login: bool,
}

/// Reads and writes the user's session through a [`CredentialStore`].
///
/// The bearer token and the user record are written and cleared as a pair.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Load the persisted session, if both halves are present and readable.
    ///
    /// A token without a user (or the reverse, or an unreadable user record)
    /// is left over from an interrupted write and is cleared.
    pub fn load(&self) -> Result<Option<UserSession>> {
        let token = self.store.get(USER_TOKEN_KEY)?;
        let user_json = self.store.get(USER_DATA_KEY)?;

        match (token, user_json) {
            (Some(token), Some(user_json)) => {
                match serde_json::from_str::<UserProfile>(&user_json) {
                    Ok(user) => Ok(Some(UserSession {
                        token,
                        user,
                        skip_login: self.skip_login()?,
                    })),
                    Err(e) => {
                        warn!(error = %e, "Stored user record is unreadable, clearing session");
                        self.logout()?;
                        Ok(None)
                    }
                }
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Found half of a stored session, clearing it");
                self.logout()?;
                Ok(None)
            }
        }
    }

    /// The stored bearer token, only when a complete session exists
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|s| s.token))
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.load()?.is_some())
    }

    /// Persist a successful sign-in.
    ///
    /// If the user record cannot be written the token is removed again, so
    /// the store never holds only one of the two.
    pub fn save_login(&self, payload: &AuthPayload) -> Result<UserSession> {
        let user_json =
            serde_json::to_string(&payload.user).context("Failed to serialize user profile")?;

        self.store
            .set(USER_TOKEN_KEY, &payload.token)
            .context("Failed to store user token")?;

        if let Err(e) = self.store.set(USER_DATA_KEY, &user_json) {
            if let Err(rollback) = self.store.remove(USER_TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back user token");
            }
            return Err(e.context("Failed to store user profile"));
        }

        // A real sign-in replaces browsing as a guest
        self.store.remove(SKIP_LOGIN_KEY)?;
        debug!(user_id = payload.user.id, "Session saved");

        Ok(UserSession {
            token: payload.token.clone(),
            user: payload.user.clone(),
            skip_login: false,
        })
    }

    /// Replace the stored profile after an update, keeping the token.
    pub fn update_user(&self, user: &UserProfile) -> Result<()> {
        if self.store.get(USER_TOKEN_KEY)?.is_none() {
            anyhow::bail!("No active session to update");
        }
        let user_json = serde_json::to_string(user).context("Failed to serialize user profile")?;
        self.store.set(USER_DATA_KEY, &user_json)
    }

    /// Clear token and user together.
    pub fn logout(&self) -> Result<()> {
        let token_result = self.store.remove(USER_TOKEN_KEY);
        let user_result = self.store.remove(USER_DATA_KEY);
        token_result.context("Failed to remove user token")?;
        user_result.context("Failed to remove user profile")?;
        debug!("Session cleared");
        Ok(())
    }

    pub fn skip_login(&self) -> Result<bool> {
        Ok(self.store.get(SKIP_LOGIN_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_skip_login(&self, skip: bool) -> Result<()> {
        if skip {
            self.store.set(SKIP_LOGIN_KEY, "true")
        } else {
            self.store.remove(SKIP_LOGIN_KEY)
        }
    }

    /// Saved display language, Arabic when none or an unknown code is stored
    pub fn language(&self) -> Result<Language> {
        Ok(self
            .store
            .get(LANGUAGE_KEY)?
            .as_deref()
            .and_then(Language::from_code)
            .unwrap_or_default())
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        self.store.set(LANGUAGE_KEY, language.code())
    }

    /// This installation's identifier, generated on first use
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.store.get(DEVICE_ID_KEY)?.filter(|id| !id.is_empty()) {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.store
            .set(DEVICE_ID_KEY, &id)
            .context("Failed to store device id")?;
        Ok(id)
    }
}
