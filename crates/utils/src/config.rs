//! Operator configuration for talking to the admin backend.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const API_URL_ENV: &str = "SIZE_ADMIN_API_URL";
pub const TOKEN_ENV: &str = "SIZE_ADMIN_TOKEN";

const DEFAULT_API_URL: &str = "http://localhost:8000/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NAME_CHECK_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid api url {0:?}: {1}")]
    InvalidUrl(String, url::ParseError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_url: Option<String>,
    token: Option<SecretString>,
    request_timeout_secs: Option<u64>,
    name_check_debounce_ms: Option<u64>,
}

/// Resolved configuration: file values, then environment, then explicit overrides.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub api_url: Url,
    pub token: Option<SecretString>,
    pub request_timeout: Duration,
    pub name_check_debounce: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name_check_debounce: Duration::from_millis(DEFAULT_NAME_CHECK_DEBOUNCE_MS),
        }
    }
}

impl AdminConfig {
    /// `<config dir>/size-admin/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("size-admin").join("config.toml"))
    }

    /// Load from `path` (or the default location) and apply environment overrides. A missing
    /// file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let file = match path {
            Some(path) if path.exists() => Self::read_file(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                FileConfig::default()
            }
            None => FileConfig::default(),
        };

        let mut config = Self::from_file(file)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_url = parse_api_url(&url)?;
        }
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.token = Some(SecretString::from(token));
        }
        Ok(config)
    }

    /// Replace the API base URL, e.g. from a command-line flag.
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_api_url(url)?;
        Ok(self)
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_url: match file.api_url {
                Some(url) => parse_api_url(&url)?,
                None => defaults.api_url,
            },
            token: file.token,
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            name_check_debounce: file
                .name_check_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.name_check_debounce),
        })
    }
}

/// Endpoint paths are joined onto the base, so it must end with `/`.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_api_url_gets_trailing_slash() {
        let url = parse_api_url("https://admin.example.com/api/v1").unwrap();
        assert_eq!(url.as_str(), "https://admin.example.com/api/v1/");
        assert_eq!(url.join("size").unwrap().path(), "/api/v1/size");
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_url = "https://shop.example.com/api"
token = "abc"
name_check_debounce_ms = 250
"#,
        )
        .unwrap();

        let config = AdminConfig::from_file(AdminConfig::read_file(&path).unwrap()).unwrap();
        assert_eq!(config.api_url.as_str(), "https://shop.example.com/api/");
        assert_eq!(config.token.unwrap().expose_secret(), "abc");
        assert_eq!(config.name_check_debounce, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_bad_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = [").unwrap();
        assert!(matches!(
            AdminConfig::read_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
