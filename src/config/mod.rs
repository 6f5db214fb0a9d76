//! Typed configuration
//!
//! Strongly-typed server settings with defaults, an optional JSON config
//! file, and environment overrides, validated before use.
//!
//! Precedence: defaults, then the config file, then `POLLROOM_*` variables
//! (plus plain `PORT`, which deployment platforms commonly inject).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bounds for poll time limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollLimits {
    /// Smallest accepted time limit.
    pub min_seconds: u64,
    /// Largest accepted time limit.
    pub max_seconds: u64,
    /// Applied when a creation request omits the time limit.
    pub default_seconds: u64,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            min_seconds: 10,
            max_seconds: 300,
            default_seconds: 60,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Bind address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
    /// Poll time-limit bounds.
    pub poll: PollLimits,
    /// Maximum retained history entries. `None` keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_cap: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            poll: PollLimits::default(),
            history_cap: None,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then `path` if given, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var("POLLROOM_BIND") {
            self.bind = bind;
        }
        let port = std::env::var("POLLROOM_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(Ok(port)) = port.map(|p| p.parse()) {
            self.port = port;
        }
        if let Ok(Ok(cap)) = std::env::var("POLLROOM_HISTORY_CAP").map(|v| v.parse()) {
            self.history_cap = Some(cap);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.min_seconds == 0 {
            return Err(ConfigError::Invalid(
                "poll.minSeconds must be positive".into(),
            ));
        }
        if self.poll.min_seconds >= self.poll.max_seconds {
            return Err(ConfigError::Invalid(
                "poll.minSeconds must be below poll.maxSeconds".into(),
            ));
        }
        if self.poll.default_seconds < self.poll.min_seconds
            || self.poll.default_seconds > self.poll.max_seconds
        {
            return Err(ConfigError::Invalid(
                "poll.defaultSeconds must lie within the configured bounds".into(),
            ));
        }
        if self.history_cap == Some(0) {
            return Err(ConfigError::Invalid("historyCap must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 5000);
        assert_eq!(config.poll.default_seconds, 60);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config =
            serde_json::from_str(r#"{"port": 8080, "poll": {"maxSeconds": 120}}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll.max_seconds, 120);
        // Untouched fields keep their defaults.
        assert_eq!(config.poll.min_seconds, 10);
        assert_eq!(config.bind, "0.0.0.0");
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = Config::default();
        config.poll.min_seconds = 300;
        config.poll.max_seconds = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_min() {
        let mut config = Config::default();
        config.poll.min_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_default_outside_bounds() {
        let mut config = Config::default();
        config.poll.default_seconds = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_history_cap() {
        let config = Config {
            history_cap: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
