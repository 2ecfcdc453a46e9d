//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use companion_client::ClientConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API connection and session key names
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding persisted session data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".companion")
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// File the session store persists to.
    pub fn session_file(&self) -> PathBuf {
        self.session.data_dir.join("session.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("companion.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session_file(), PathBuf::from(".companion/session.json"));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.toml");
        std::fs::write(
            &path,
            r#"
[client]
base_url = "https://trips.example.com"

[client.storage]
credential = "jwt"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.client.base_url, "https://trips.example.com");
        assert_eq!(config.client.storage.credential, "jwt");
        assert_eq!(config.client.storage.identity, "user");
        assert_eq!(config.session.data_dir, PathBuf::from(".companion"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.toml");
        std::fs::write(&path, "client = 3").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
