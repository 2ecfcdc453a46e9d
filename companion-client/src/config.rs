//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "COMPANION_API_URL";

/// Configuration for the Travel Companion client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the trip-planning API
    pub base_url: String,
    /// Key names for persisted session data
    pub storage: StorageKeys,
    /// Username used when a credential is restored without an identity
    pub placeholder_username: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            storage: StorageKeys::default(),
            placeholder_username: "User".to_string(),
        }
    }
}

impl ClientConfig {
    /// Default config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults, with the base URL taken from `COMPANION_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment overrides on top of this config.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
    }

    /// Check the config is usable.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base_url {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.storage.credential == self.storage.identity {
            return Err(ClientError::Config(
                "credential and identity must use different storage keys".into(),
            ));
        }
        Ok(())
    }
}

/// Storage key names for the credential/identity pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub credential: String,
    pub identity: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            credential: "token".to_string(),
            identity: "user".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.storage.credential, "token");
        assert_eq!(config.storage.identity, "user");
        assert_eq!(config.placeholder_username, "User");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://trips.example.com"}"#).unwrap();
        assert_eq!(config.base_url, "https://trips.example.com");
        assert_eq!(config.storage, StorageKeys::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ftp://trips.example.com").validate().is_err());

        let mut config = ClientConfig::default();
        config.storage.identity = "token".into();
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }
}
