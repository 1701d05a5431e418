//! Runtime configuration.

use crate::{Error, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Logging configuration, usually loaded from a TOML file.
///
/// ```
/// use tincan_store::Config;
///
/// let config = Config::from_toml_str(r#"trace_level = "tincan_store=debug""#).unwrap();
/// assert_eq!(config.level(), "tincan_store=debug");
/// assert!(config.ansi);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directives for the fmt subscriber.
    ///
    /// Accepts anything `RUST_LOG` accepts: `debug`, `tincan_store=trace`.
    /// Default: `"info"`
    pub trace_level: Option<String>,

    /// Colored terminal output. Default: `true`
    pub ansi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace_level: None,
            ansi: true,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigParse`] for malformed TOML, [`Error::Config`] for an
    /// unusable filter.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// The effective filter directives.
    #[must_use]
    pub fn level(&self) -> &str {
        self.trace_level.as_deref().unwrap_or("info")
    }

    /// Check that the filter directives parse.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the offending directives.
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(self.level())
            .map(|_| ())
            .map_err(|e| Error::Config(format!("invalid trace_level `{}`: {e}", self.level())))
    }
}
