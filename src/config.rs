// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{
    DEFAULT_CHANNEL_URL, DEFAULT_CODE_LENGTH, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_CODE_ATTEMPTS,
    DEFAULT_REGION,
};
use crate::phone::{Region, UnknownRegion};

/// Configuration for a bulletin board instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region code (ISO 3166-1 alpha-2) used for phone numbers without a country prefix.
    pub default_region: String,

    /// Length of generated possession codes.
    pub code_length: usize,

    /// Deep-link base of the messaging channel.
    pub channel_url: String,

    /// Maximum number of undo steps kept per session, `None` keeps all of them.
    pub history_limit: Option<usize>,

    /// Attempts at finding an unused possession code before a submission fails.
    pub max_code_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_owned(),
            code_length: DEFAULT_CODE_LENGTH,
            channel_url: DEFAULT_CHANNEL_URL.to_owned(),
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

impl Config {
    /// Read configuration from a JSON file, missing keys fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn region(&self) -> Result<Region, ConfigError> {
        Ok(self.default_region.parse()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.region()?;
        if self.code_length == 0 {
            return Err(ConfigError::ZeroCodeLength);
        }
        if self.max_code_attempts == 0 {
            return Err(ConfigError::ZeroCodeAttempts);
        }
        if self.channel_url.trim().is_empty() {
            return Err(ConfigError::EmptyChannelUrl);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownRegion(#[from] UnknownRegion),

    #[error("possession code length must be greater than zero")]
    ZeroCodeLength,

    #[error("maximum code attempts must be greater than zero")]
    ZeroCodeAttempts,

    #[error("messaging channel url is empty")]
    EmptyChannelUrl,

    #[error("could not read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{Config, ConfigError};

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.region().unwrap().to_string(), "IN");
        assert_eq!(config.code_length, 6);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "default_region": "KE" }"#).unwrap();
        assert_eq!(config.default_region, "KE");
        assert_eq!(config.code_length, 6);
        assert_eq!(config.history_limit, Some(32));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = Config {
            code_length: 0,
            ..Config::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::ZeroCodeLength));

        let config = Config {
            default_region: "Atlantis".into(),
            ..Config::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::UnknownRegion(_)));
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrilink.json");
        std::fs::write(&path, r#"{ "code_length": 8, "history_limit": null }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.code_length, 8);
        assert_eq!(config.history_limit, None);
    }
}
