//! Configuration loader with layered approach.
//!
//! Layers, later overriding earlier:
//! 1. Default values
//! 2. Configuration file (TOML or JSON)
//! 3. Environment variables (`PREFIX__SECTION__KEY`)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, HermesConfig, LogFormat};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use hermes_config::ConfigLoader;
///
/// # fn main() -> Result<(), hermes_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("hermes.toml")?
///     .with_env_prefix("HERMES")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: HermesConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current values with the contents of a file.
    ///
    /// The format is picked from the extension (`.toml` or `.json`).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;

        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replace the current values with configuration text in `format`
    /// (`"toml"` or `"json"`).
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` environment variables on [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate.
    pub fn load(self) -> Result<HermesConfig, ConfigError> {
        let vars = env::vars();
        self.load_from(vars)
    }

    /// Like [`load`](Self::load), reading variables from `vars` instead of
    /// the process environment.
    pub fn load_from<I>(mut self, vars: I) -> Result<HermesConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if let Some(prefix) = self.env_prefix.take() {
            for (key, value) in vars {
                if key.starts_with(&prefix) {
                    self.apply_env_var(&key, &value, &prefix)?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> HermesConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<HermesConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["RUNTIME", "FORCE"] => {
                self.config.runtime.force = non_empty(value);
            }

            ["BRIDGE", "TIMEOUT_MS"] => {
                self.config.bridge.timeout_ms = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        ConfigError::env_parse_error(key, "expected integer or 'none'")
                    })?)
                };
            }

            ["NATIVE", "LIBRARY_PATH"] => {
                self.config.native.library_path = non_empty(value).map(PathBuf::from);
            }
            ["NATIVE", "SYMBOL_PREFIX"] => {
                self.config.native.symbol_prefix = value.to_string();
            }

            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
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

            // Unknown key - ignore
            _ => {}
        }

        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load_from(Vec::new()).unwrap();
        assert_eq!(config, HermesConfig::default());
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [runtime]
            force = "deno"

            [bridge]
            timeout_ms = 2500

            [native]
            library_path = "/opt/hermes/libhermes_ffi.so"

            [logging]
            enabled = true
            level = "debug"
            format = "pretty"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load_from(Vec::new())
            .unwrap();

        assert_eq!(config.runtime.force.as_deref(), Some("deno"));
        assert_eq!(config.bridge.timeout_ms, Some(2500));
        assert_eq!(
            config.native.library_path,
            Some(PathBuf::from("/opt/hermes/libhermes_ffi.so"))
        );
        assert_eq!(config.native.symbol_prefix, "hermes");
        assert!(config.logging.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"native": {"symbol_prefix": "tachyon"}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load_from(Vec::new())
            .unwrap();

        assert_eq!(config.native.symbol_prefix, "tachyon");
    }

    #[test]
    fn test_loader_with_string_unsupported() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[bridge]\ntimeout_ms = 100").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load_from(Vec::new())
            .unwrap();
        assert_eq!(config.bridge.timeout_ms, Some(100));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/hermes.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/hermes.toml")
            .unwrap()
            .load_unvalidated();
        assert_eq!(config, HermesConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::new()
            .with_env_prefix("HERMES")
            .load_from(vars(&[
                ("HERMES__RUNTIME__FORCE", "bun"),
                ("HERMES__BRIDGE__TIMEOUT_MS", "750"),
                ("HERMES__NATIVE__LIBRARY_PATH", "./libengine.so"),
                ("HERMES__NATIVE__SYMBOL_PREFIX", "engine"),
                ("HERMES__LOGGING__ENABLED", "yes"),
                ("HERMES__LOGGING__LEVEL", "trace"),
                ("HERMES__LOGGING__FORMAT", "PRETTY"),
                ("HERMES__UNKNOWN__KEY", "ignored"),
                ("OTHER__RUNTIME__FORCE", "node"),
            ]))
            .unwrap();

        assert_eq!(config.runtime.force.as_deref(), Some("bun"));
        assert_eq!(config.bridge.timeout_ms, Some(750));
        assert_eq!(config.native.library_path, Some(PathBuf::from("./libengine.so")));
        assert_eq!(config.native.symbol_prefix, "engine");
        assert!(config.logging.enabled);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_override_beats_file() {
        let config = ConfigLoader::new()
            .with_string("[bridge]\ntimeout_ms = 100", "toml")
            .unwrap()
            .with_env_prefix("HERMES")
            .load_from(vars(&[("HERMES__BRIDGE__TIMEOUT_MS", "none")]))
            .unwrap();
        assert_eq!(config.bridge.timeout_ms, None);
    }

    #[test]
    fn test_env_invalid_values() {
        let result = ConfigLoader::new()
            .with_env_prefix("HERMES")
            .load_from(vars(&[("HERMES__BRIDGE__TIMEOUT_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));

        let result = ConfigLoader::new()
            .with_env_prefix("HERMES")
            .load_from(vars(&[("HERMES__LOGGING__FORMAT", "xml")]));
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_env_values_are_validated() {
        let result = ConfigLoader::new()
            .with_env_prefix("HERMES")
            .load_from(vars(&[("HERMES__RUNTIME__FORCE", "rhino")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
