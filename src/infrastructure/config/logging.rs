//! Logging configuration and initialization.

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;

const FORMATS: &[&str] = &["pretty", "compact", "json"];

/// Output of supervised children stays visible at the default level.
const PANE_DIRECTIVE: &str = "stackpilot::pane=info";

/// Logging configuration.
///
/// Logs go to stderr so that stdout stays clean for `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Filter directive after applying `-v` / `--quiet`.
    ///
    /// Each `-v` raises the configured level by one step; `--quiet` caps it at
    /// `error`.
    #[must_use]
    pub fn effective_level(&self, verbose: u8, quiet: bool) -> String {
        if quiet {
            return "error".into();
        }
        if verbose == 0 {
            return self.level.clone();
        }
        let steps = ["error", "warn", "info", "debug", "trace"];
        let current = steps
            .iter()
            .position(|s| self.level.eq_ignore_ascii_case(s))
            .unwrap_or(1);
        let raised = (current + usize::from(verbose)).min(steps.len() - 1);
        steps[raised].into()
    }

    /// Initialize the tracing subscriber with this logging configuration.
    ///
    /// `RUST_LOG` takes precedence over the configured level.
    pub fn init(&self, verbose: u8, quiet: bool) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let filter = EnvFilter::new(self.effective_level(verbose, quiet));
            match PANE_DIRECTIVE.parse() {
                Ok(directive) if !quiet => filter.add_directive(directive),
                _ => filter,
            }
        });

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            "compact" => {
                fmt()
                    .compact()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !FORMATS.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected one of {}", FORMATS.join(", ")),
            });
        }
        if EnvFilter::try_new(&self.level).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                reason: format!("'{}' is not a valid filter", self.level),
            });
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "pretty".into(),
        }
    }
}
