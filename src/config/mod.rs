//! Settings for building server requests from an environment.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::Version;
use crate::upload::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Factory and upload settings.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Host used when the environment names neither a host nor a server.
    pub default_host: String,

    /// Protocol version used when the environment has no `SERVER_PROTOCOL`.
    pub default_protocol_version: String,

    /// Bytes copied per step when an upload is moved.
    pub copy_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_host: "localhost".to_owned(),
            default_protocol_version: "1.1".to_owned(),
            copy_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, [`ConfigError::Invalid`]
    /// if a field fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_host",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.copy_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "copy_chunk_size",
                reason: "must be greater than zero".to_owned(),
            });
        }
        self.protocol_version()?;
        Ok(())
    }

    /// The default protocol version as a parsed [`Version`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the version is not supported.
    pub fn protocol_version(&self) -> Result<Version, ConfigError> {
        self.default_protocol_version
            .parse::<Version>()
            .map_err(|e| ConfigError::Invalid {
                field: "default_protocol_version",
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_host, "localhost");
        assert_eq!(config.copy_chunk_size, 8192);
        assert_eq!(config.protocol_version().unwrap(), Version::Http11);
    }

    #[test]
    fn partial_document() {
        let config = Config::from_json_str(r#"{"default_host":"api.local","copy_chunk_size":16}"#)
            .unwrap();
        assert_eq!(config.default_host, "api.local");
        assert_eq!(config.copy_chunk_size, 16);
        assert_eq!(config.default_protocol_version, "1.1");
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(matches!(
            Config::from_json_str(r#"{"copy_chunk_size":0}"#),
            Err(ConfigError::Invalid {
                field: "copy_chunk_size",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(matches!(
            Config::from_json_str(r#"{"default_protocol_version":"3"}"#),
            Err(ConfigError::Invalid {
                field: "default_protocol_version",
                ..
            })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Config::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("httpmsg-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"default_protocol_version":"2"}"#).unwrap();
        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.protocol_version().unwrap(), Version::Http2);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(Config::from_path(&path), Err(ConfigError::Io(_))));
    }
}
