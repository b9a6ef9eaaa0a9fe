//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, LogFormat, ServiceConfig};

/// Configuration loader.
///
/// Layers apply in order, later ones overriding earlier ones:
/// 1. Default values
/// 2. Configuration file or string (TOML or JSON)
/// 3. Environment variables
///
/// [`load`](Self::load) normalizes and validates the result.
///
/// # Example
///
/// ```no_run
/// use stratum_config::ConfigLoader;
///
/// # fn main() -> Result<(), stratum_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("service.toml")?
///     .with_env_prefix("STRATUM")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ServiceConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
            env_prefix: None,
        }
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ServiceConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ServiceConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// contains unknown fields, or has an unsupported extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.config = parse(&content, &extension)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Same as [`with_file`](Self::with_file) for an existing file.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[version]\nmin = 2\nmax = 5\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.version.max, 5);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables environment overrides of the form `PREFIX__SECTION__KEY`.
    ///
    /// With prefix `STRATUM`:
    /// - `STRATUM__ADDR=127.0.0.1:9000`
    /// - `STRATUM__VERSION__MAX=3`
    /// - `STRATUM__LOG__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads variables from a `.env` file into the process environment.
    ///
    /// A missing file is ignored.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Applies environment overrides, normalizes, validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the final
    /// configuration is invalid.
    pub fn load(mut self) -> Result<ServiceConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.finalize()
    }

    /// Returns the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ServiceConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, &marker)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, marker: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(marker) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ADDR"] => config.addr = value.to_string(),
            ["PREFIX"] => config.prefix = value.to_string(),
            ["SHUTDOWN_TIMEOUT_SECS"] => config.shutdown_timeout_secs = parse_num(key, value)?,

            ["CORS", "ENABLED"] => config.cors.enabled = parse_flag(key, value)?,
            ["CORS", "ALLOWED_ORIGINS"] => config.cors.allowed_origins = parse_list(value),
            ["CORS", "ALLOWED_METHODS"] => config.cors.allowed_methods = parse_list(value),
            ["CORS", "ALLOWED_HEADERS"] => config.cors.allowed_headers = parse_list(value),
            ["CORS", "EXPOSED_HEADERS"] => config.cors.exposed_headers = parse_list(value),
            ["CORS", "ALLOW_CREDENTIALS"] => config.cors.allow_credentials = parse_flag(key, value)?,
            ["CORS", "MAX_AGE_SECS"] => config.cors.max_age_secs = Some(parse_num(key, value)?),

            ["DEBUG", "STACKS"] => config.debug.stacks = parse_flag(key, value)?,
            ["DEBUG", "STACK_SIZE"] => config.debug.stack_size = parse_num(key, value)?,

            ["LOG", "SERVICE_LEVEL"] => config.log.service_level = value.to_string(),
            ["LOG", "SERVICE_PATH"] => config.log.service_path = parse_path(value),
            ["LOG", "ACCESS_PATH"] => config.log.access_path = parse_path(value),
            ["LOG", "FORMAT"] => {
                config.log.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            ["METRICS", "ENABLED"] => config.metrics.enabled = parse_flag(key, value)?,
            ["METRICS", "URI_PATH"] => config.metrics.uri_path = value.to_string(),

            ["TRACE", "ENABLED"] => config.trace.enabled = parse_flag(key, value)?,
            ["TRACE", "TRACER"] => config.trace.tracer = value.to_string(),
            ["TRACE", "PARAMS"] => {
                config.trace.params = serde_json::from_str(value)
                    .map_err(|e| ConfigError::env(key, e.to_string()))?;
            }

            ["VERSION", "MIN"] => config.version.min = parse_num(key, value)?,
            ["VERSION", "MAX"] => config.version.max = parse_num(key, value)?,

            // Unknown keys are ignored
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<ServiceConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env(key, "expected boolean")),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env(key, "expected integer"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.metrics.uri_path, "/metrics");
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert!(config.debug.stacks);
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            addr = "127.0.0.1:3000"
            prefix = "/api/"

            [version]
            min = 2
            max = 42
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.prefix, "/api");
        assert_eq!(config.version.min, 2);
        assert_eq!(config.version.max, 42);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"metrics": {"enabled": true, "uri_path": "/stats"}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.uri_path, "/stats");
    }

    #[test]
    fn test_loader_unknown_format() {
        let result = ConfigLoader::new().with_string("addr: x", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_unknown_field() {
        let result = ConfigLoader::new().with_string("listen = \"0.0.0.0:1\"", "toml");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_loader_validation_fails() {
        let result = ConfigLoader::new()
            .with_string("[version]\nmin = 5\nmax = 2\n", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::VersionRange { min: 5, max: 2 })));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("STRATUM_LOADER_TEST__VERSION__MAX", "7");
        env::set_var("STRATUM_LOADER_TEST__CORS__ALLOWED_ORIGINS", "https://a.io, https://b.io");
        env::set_var("STRATUM_LOADER_TEST__DEBUG__STACKS", "yes");

        let config = ConfigLoader::new()
            .with_env_prefix("stratum_loader_test")
            .load()
            .unwrap();

        assert_eq!(config.version.max, 7);
        assert_eq!(config.cors.allowed_origins, vec!["https://a.io", "https://b.io"]);
        assert!(config.debug.stacks);

        env::remove_var("STRATUM_LOADER_TEST__VERSION__MAX");
        env::remove_var("STRATUM_LOADER_TEST__CORS__ALLOWED_ORIGINS");
        env::remove_var("STRATUM_LOADER_TEST__DEBUG__STACKS");
    }

    #[test]
    fn test_env_override_parse_error() {
        env::set_var("STRATUM_BAD_ENV_TEST__VERSION__MIN", "one");
        let result = ConfigLoader::new()
            .with_env_prefix("STRATUM_BAD_ENV_TEST")
            .load();
        env::remove_var("STRATUM_BAD_ENV_TEST__VERSION__MIN");

        assert!(matches!(result, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("K", "on").unwrap());
        assert!(!parse_flag("K", "0").unwrap());
        assert!(parse_flag("K", "maybe").is_err());
    }
}
