//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env` and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use routerhttp_telemetry::LogFormat;

use crate::config::RouterHttpConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON, chosen by extension)
/// 3. Environment variables, optionally seeded from a `.env` file
///
/// # Example
///
/// ```no_run
/// use routerhttp_config::ConfigLoader;
///
/// # fn main() -> Result<(), routerhttp_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("routerhttp.toml")?
///     .with_dotenv()
///     .with_env_prefix("ROUTERHTTP")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: RouterHttpConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader starting from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = RouterHttpConfig::development();
        self
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// Fields the file leaves out keep their defaults; unknown fields are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed, or has an
    /// unsupported extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use routerhttp_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     http_addr = "127.0.0.1:3000"
    ///
    ///     [websocket]
    ///     max_connections = 100
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// assert_eq!(config.websocket.max_connections, 100);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Load a `.env` file into the process environment, if one exists.
    ///
    /// Variables already set in the environment win over the file.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();
        self
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `ROUTERHTTP__SERVER__HTTP_ADDR=0.0.0.0:9000` or
    /// `ROUTERHTTP__WEBSOCKET__MAX_CONNECTIONS=50`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides, validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Fails if an environment variable cannot be parsed or validation
    /// fails.
    pub fn load(mut self) -> ConfigResult<RouterHttpConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without environment overrides or
    /// validation.
    #[must_use]
    pub fn load_unvalidated(self) -> RouterHttpConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> ConfigResult<RouterHttpConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> ConfigResult<()> {
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> ConfigResult<()> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // Shares the prefix but not the separator, e.g. ROUTERHTTP_HOME.
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "WEBSOCKET_HOST"] => config.server.websocket_host = value.to_string(),
            ["SERVER", "HEADER_TIMEOUT_MS"] => {
                config.server.header_timeout_ms = parse_optional_millis(key, value)?;
            }

            ["WEBSOCKET", "MAX_CONNECTIONS"] => {
                config.websocket.max_connections = parse_number(key, value)?;
            }
            ["WEBSOCKET", "REAP_INTERVAL_MS"] => {
                config.websocket.reap_interval_ms = parse_number(key, value)?;
            }
            ["WEBSOCKET", "HANDSHAKE_TIMEOUT_MS"] => {
                config.websocket.handshake_timeout_ms = parse_optional_millis(key, value)?;
            }
            ["WEBSOCKET", "KEEPALIVE_PING"] => {
                config.websocket.keepalive_ping = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["WEBSOCKET", "MAX_MESSAGE_SIZE"] => {
                config.websocket.max_message_size = parse_number(key, value)?;
            }

            ["LOGGING", "ENABLED"] => {
                config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            ["METRICS", "ENABLED"] => {
                config.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["METRICS", "ADDR"] => config.metrics.addr = value.to_string(),

            _ => {}
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

/// Empty or `none` clears the timeout.
fn parse_optional_millis(key: &str, value: &str) -> ConfigResult<Option<u64>> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse_number(key, value).map(Some)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
