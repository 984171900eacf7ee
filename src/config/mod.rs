//! Service configuration
//!
//! Layered resolution: built-in defaults, then an optional TOML file
//! (`snapcrew.toml`), then the `SNAPCREW_SECRET` environment variable
//! for the secret. The secret is mandatory; token minting cannot run
//! without one.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;

/// Default retry budget for short-code collisions
pub const DEFAULT_SHORT_CODE_ATTEMPTS: u32 = 8;

/// Environment variable overriding the configured secret
pub const SECRET_ENV_VAR: &str = "SNAPCREW_SECRET";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    IoError(String),

    #[error("TOML parse error: {0}")]
    ParseError(String),

    #[error("no server secret configured (set `secret` in snapcrew.toml or {SECRET_ENV_VAR})")]
    MissingSecret,
}

/// Configuration consumed by the join manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Server secret keyed into every token's authentication code
    pub secret: String,

    /// Token lifetime in minutes
    pub token_ttl_minutes: i64,

    /// How many times to resample a colliding short code before failing
    pub short_code_attempts: u32,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            short_code_attempts: DEFAULT_SHORT_CODE_ATTEMPTS,
        }
    }
}

/// On-disk shape of snapcrew.toml; every field optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    secret: Option<String>,
    token_ttl_minutes: Option<i64>,
    short_code_attempts: Option<u32>,
}

impl JoinConfig {
    /// Resolve configuration from an optional TOML file and the
    /// environment. Env secret wins over the file's.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::IoError(e.to_string()))?;
                toml::from_str::<ConfigFile>(&raw)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?
            }
            None => ConfigFile::default(),
        };

        let defaults = JoinConfig::default();
        let secret = std::env::var(SECRET_ENV_VAR)
            .ok()
            .filter(|s| !s.is_empty())
            .or(file.secret)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        Ok(Self {
            secret,
            token_ttl_minutes: file.token_ttl_minutes.unwrap_or(defaults.token_ttl_minutes),
            short_code_attempts: file
                .short_code_attempts
                .unwrap_or(defaults.short_code_attempts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = JoinConfig::default();
        assert_eq!(config.token_ttl_minutes, 15);
        assert_eq!(config.short_code_attempts, 8);
        assert!(config.secret.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "secret = \"file-secret\"").unwrap();
        writeln!(file, "token_ttl_minutes = 30").unwrap();

        let config = JoinConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.secret, "file-secret");
        assert_eq!(config.token_ttl_minutes, 30);
        assert_eq!(config.short_code_attempts, DEFAULT_SHORT_CODE_ATTEMPTS);
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_ttl_minutes = 5").unwrap();

        // Only run the negative case when the env override is absent;
        // the test harness must not depend on ambient environment.
        if std::env::var(SECRET_ENV_VAR).is_err() {
            let err = JoinConfig::load(Some(file.path())).unwrap_err();
            assert!(matches!(err, ConfigError::MissingSecret));
        }
    }

    #[test]
    fn test_parse_error_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "secret = [not toml").unwrap();
        let err = JoinConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
