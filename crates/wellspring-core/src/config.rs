//! Application configuration management.
//!
//! Configuration is read from `~/.config/wellspring/config.json` and then
//! overridden by `WELLSPRING_*` environment variables. It selects the API
//! environment, holds the application key/secret used for the token
//! exchange, and chooses where session state is stored.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::{AppCredentials, ClientSettings};
use crate::i18n::Language;

/// Application name used for config/data directory paths
const APP_NAME: &str = "wellspring";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session store file name in the data directory
const STORE_FILE: &str = "store.json";

const DEVELOPMENT_BASE_URL: &str = "http://localhost:8000/api";
const PRODUCTION_BASE_URL: &str = "https://api.wellspring.org/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    /// Overrides the environment's base URL when set
    pub base_url: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub request_timeout_secs: u64,
    /// Keep session state in the OS keychain instead of a file
    pub secure_store: bool,
    pub store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            app_key: None,
            app_secret: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            secure_store: false,
            store_path: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `WELLSPRING_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("WELLSPRING_ENV") {
            self.environment = Environment::parse(&env)
                .with_context(|| format!("WELLSPRING_ENV must be development or production, got {:?}", env))?;
        }
        if let Some(url) = lookup("WELLSPRING_API_URL").filter(|u| !u.is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(key) = lookup("WELLSPRING_APP_KEY") {
            self.app_key = Some(key);
        }
        if let Some(secret) = lookup("WELLSPRING_APP_SECRET") {
            self.app_secret = Some(secret);
        }
        if let Some(timeout) = lookup("WELLSPRING_TIMEOUT_SECS") {
            self.request_timeout_secs = timeout
                .parse()
                .context("WELLSPRING_TIMEOUT_SECS must be a whole number of seconds")?;
        }
        if let Some(secure) = lookup("WELLSPRING_SECURE_STORE") {
            self.secure_store = matches!(secure.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn credentials(&self) -> Result<AppCredentials> {
        let app_key = self
            .app_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("Application key is not configured (set WELLSPRING_APP_KEY)")?;
        let app_secret = self
            .app_secret
            .clone()
            .filter(|s| !s.is_empty())
            .context("Application secret is not configured (set WELLSPRING_APP_SECRET)")?;
        Ok(AppCredentials { app_key, app_secret })
    }

    /// Settings for an `ApiClient` on this device
    pub fn client_settings(&self, device_id: String, language: Language) -> Result<ClientSettings> {
        Ok(ClientSettings {
            base_url: self.api_base_url().to_string(),
            credentials: self.credentials()?,
            timeout: self.request_timeout(),
            device_id,
            language,
        })
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the file-backed session store lives
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(STORE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), PRODUCTION_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.credentials().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("WELLSPRING_ENV", "dev"),
                ("WELLSPRING_APP_KEY", "key"),
                ("WELLSPRING_APP_SECRET", "secret"),
                ("WELLSPRING_TIMEOUT_SECS", "3"),
                ("WELLSPRING_SECURE_STORE", "true"),
            ]))
            .expect("overrides");

        assert_eq!(config.api_base_url(), DEVELOPMENT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert!(config.secure_store);

        let settings = config
            .client_settings("device".to_string(), Language::English)
            .expect("settings");
        assert_eq!(settings.credentials.app_key, "key");
        assert_eq!(settings.base_url, DEVELOPMENT_BASE_URL);
    }

    #[test]
    fn test_explicit_url_wins() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("WELLSPRING_API_URL", "http://10.0.2.2:8000/api")]))
            .expect("overrides");
        assert_eq!(config.api_base_url(), "http://10.0.2.2:8000/api");
    }

    #[test]
    fn test_bad_overrides_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_overrides(lookup(&[("WELLSPRING_ENV", "staging")])).is_err());
        assert!(config.apply_overrides(lookup(&[("WELLSPRING_TIMEOUT_SECS", "ten")])).is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let config: Config = serde_json::from_str(r#"{"environment": "development"}"#).expect("parse");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
