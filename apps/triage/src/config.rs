//! # Configuration
//!
//! Settings of the binary, layered from lowest to highest precedence:
//!
//! 1. compiled-in defaults
//! 2. `triage.toml` (or the file given with `--config`)
//! 3. environment variables
//! 4. CLI flags (applied by the caller)
//!
//! ## File Layout
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [engine]
//! auto_delay_ms = 1200
//!
//! [security]
//! api_key = "change-me"
//! rate_limit = 100
//! cors_origins = ["http://localhost:3000"]
//! ```
//!
//! ## Environment Variables
//!
//! - `TRIAGE_API_KEY`: bearer key; empty disables authentication
//! - `TRIAGE_RATE_LIMIT`: requests per second, 0 disables limiting
//! - `TRIAGE_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `TRIAGE_AUTO_DELAY_MS`: delay before automatic steps resolve

use serde::Deserialize;
use std::path::Path;
use triage_core::TriageError;
use triage_core::primitives::{DEFAULT_AUTO_DELAY_MS, MAX_AUTO_DELAY_MS};

/// File read when no `--config` is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "triage.toml";

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Complete settings of the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Delay before a pending automatic step is applied.
    pub auto_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_delay_ms: DEFAULT_AUTO_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// `None` disables authentication.
    pub api_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// `None` allows localhost only; `["*"]` allows every origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

impl Config {
    /// Parse a configuration file's text.
    pub fn from_toml_str(text: &str) -> Result<Self, TriageError> {
        let mut config: Self = toml::from_str(text)
            .map_err(|e| TriageError::InvalidInput(format!("config: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Load the configuration used by the binary.
    ///
    /// An explicit `path` must exist. Without one, `triage.toml` in the
    /// working directory is read if present. Environment overrides are
    /// applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, TriageError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, TriageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TriageError::IoError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&text)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("TRIAGE_API_KEY") {
            self.security.api_key = Some(key);
        }
        if let Some(raw) = lookup("TRIAGE_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(limit) => self.security.rate_limit = limit,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TRIAGE_RATE_LIMIT"),
            }
        }
        if let Some(raw) = lookup("TRIAGE_CORS_ORIGINS") {
            self.security.cors_origins = Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Some(raw) = lookup("TRIAGE_AUTO_DELAY_MS") {
            match raw.trim().parse() {
                Ok(delay) => self.engine.auto_delay_ms = delay,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TRIAGE_AUTO_DELAY_MS"),
            }
        }
        self.normalize();
    }

    /// Override the automatic-step delay, as the `--auto-delay-ms` flag does.
    pub fn set_auto_delay_ms(&mut self, delay_ms: u64) {
        self.engine.auto_delay_ms = delay_ms;
        self.normalize();
    }

    /// The API key, if authentication is enabled.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.security.api_key.as_deref()
    }

    fn normalize(&mut self) {
        if self.security.api_key.as_deref().is_some_and(str::is_empty) {
            self.security.api_key = None;
        }
        if self.engine.auto_delay_ms > MAX_AUTO_DELAY_MS {
            tracing::warn!(
                requested = self.engine.auto_delay_ms,
                max = MAX_AUTO_DELAY_MS,
                "Auto delay clamped"
            );
            self.engine.auto_delay_ms = MAX_AUTO_DELAY_MS;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.auto_delay_ms, DEFAULT_AUTO_DELAY_MS);
        assert_eq!(config.security.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml_str("[server]\nport = 9000\n").expect("parse");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.engine.auto_delay_ms, DEFAULT_AUTO_DELAY_MS);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Config::from_toml_str("[server]\nprot = 9000\n").is_err());
        assert!(Config::from_toml_str("[database]\npath = \"x\"\n").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::from_toml_str(
            "[engine]\nauto_delay_ms = 500\n[security]\nrate_limit = 5\napi_key = \"file-key\"\n",
        )
        .expect("parse");
        config.apply_env(env(&[
            ("TRIAGE_API_KEY", "env-key"),
            ("TRIAGE_RATE_LIMIT", "0"),
            ("TRIAGE_AUTO_DELAY_MS", "250"),
            ("TRIAGE_CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]));

        assert_eq!(config.api_key(), Some("env-key"));
        assert_eq!(config.security.rate_limit, 0);
        assert_eq!(config.engine.auto_delay_ms, 250);
        assert_eq!(
            config.security.cors_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
    }

    #[test]
    fn invalid_environment_values_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("TRIAGE_RATE_LIMIT", "fast"), ("TRIAGE_AUTO_DELAY_MS", "-1")]));
        assert_eq!(config.security.rate_limit, DEFAULT_RATE_LIMIT);
        assert_eq!(config.engine.auto_delay_ms, DEFAULT_AUTO_DELAY_MS);
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = Config::default();
        config.apply_env(env(&[("TRIAGE_API_KEY", "")]));
        assert!(config.api_key().is_none());
    }

    #[test]
    fn delay_is_clamped() {
        let config = Config::from_toml_str("[engine]\nauto_delay_ms = 600000\n").expect("parse");
        assert_eq!(config.engine.auto_delay_ms, MAX_AUTO_DELAY_MS);

        let mut config = Config::default();
        config.set_auto_delay_ms(0);
        assert_eq!(config.engine.auto_delay_ms, 0);
    }

    #[test]
    fn missing_explicit_file_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
