//! Configuration management for apimon

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::WireVersion;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "APIMON";

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query construction configuration
    pub query: QueryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// Environment variables use the `APIMON_` prefix and `__` between the
    /// section and the key, e.g. `APIMON_QUERY__STEP_INTERVAL_SECS=30`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            step_interval_secs = config.query.step_interval_secs,
            summary_wire_version = %config.query.summary_wire_version,
            widget_wire_version = %config.query.widget_wire_version,
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Reject values no query engine accepts
    pub fn validate(&self) -> Result<()> {
        if self.query.step_interval_secs == 0 {
            return Err(Error::config("query.step_interval_secs must be positive"));
        }
        if self.query.top_errors_limit == 0 {
            return Err(Error::config("query.top_errors_limit must be positive"));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(Error::config(format!(
                "logging.format must be \"pretty\" or \"json\", got {other:?}"
            ))),
        }
    }
}

/// Query construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Step interval for every sub-query, in seconds
    pub step_interval_secs: u64,
    /// Row limit for the top-errors view
    pub top_errors_limit: u32,
    /// Wire format for tabular summary views
    pub summary_wire_version: WireVersion,
    /// Wire format for chart and widget views
    pub widget_wire_version: WireVersion,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            step_interval_secs: 60,
            top_errors_limit: 10,
            summary_wire_version: WireVersion::V5,
            widget_wire_version: WireVersion::V4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load(None).unwrap();

        assert_eq!(config.query.step_interval_secs, 60);
        assert_eq!(config.query.top_errors_limit, 10);
        assert_eq!(config.query.summary_wire_version, WireVersion::V5);
        assert_eq!(config.query.widget_wire_version, WireVersion::V4);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[query]\nstep_interval_secs = 30\nwidget_wire_version = \"v5\"\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.query.step_interval_secs, 30);
        assert_eq!(config.query.widget_wire_version, WireVersion::V5);
        assert_eq!(config.query.top_errors_limit, 10);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/apimon.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let mut config = Config::default();
        config.query.step_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
