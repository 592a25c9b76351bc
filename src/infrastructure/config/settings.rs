//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! section is optional; an absent file means the built-in defaults. Secrets
//! and project identifiers never come from this file, only from the
//! environment.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [session]
//! name = "dev"
//! services = ["functions", "vector-db"]
//!
//! [deploy]
//! builder = "docker"
//! workspace_root = "/src/backend"
//!
//! [[services]]
//! name = "vector-db"
//! port = 6333
//! cpu = 4
//! memory_gib = 8
//! concurrency = 10
//! max_instances = 2
//! timeout_seconds = 300
//! source_dir = "services/vector-db"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::logging::LoggingConfig;
use crate::adapter::outbound::cloud_run::BuildBackend;
use crate::application::catalog::DEFAULT_LOCAL_SERVICES;
use crate::application::ServiceRegistry;
use crate::domain::{DescriptorSpec, ProjectContext, DEFAULT_REGION, DEFAULT_SESSION_NAME};
use crate::error::{ConfigError, Result};
use crate::port::outbound::environment::EnvSource;

/// Dev session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Multiplexer session name; one session with this name at a time.
    pub name: String,
    /// Services started by `serve-all`, in pane order.
    pub services: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_NAME.into(),
            services: DEFAULT_LOCAL_SERVICES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Deployment settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub builder: BuildBackend,
    /// Region used when `REGION` is not set.
    pub region: String,
    /// Root that descriptor `source_dir`s are relative to.
    pub workspace_root: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            builder: BuildBackend::default(),
            region: DEFAULT_REGION.into(),
            workspace_root: PathBuf::from("."),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub deploy: DeployConfig,
    /// Descriptor overrides and additions, applied over the built-in catalog.
    pub services: Vec<DescriptorSpec>,
}

impl Config {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Load the file if it exists, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) for an existing file.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        self.logging.validate()?;

        validate_session_name("session.name", &self.session.name)?;
        if self.deploy.region.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "deploy.region",
            }
            .into());
        }

        self.registry()?;
        Ok(())
    }

    /// Registry built from the catalog plus `[[services]]` overrides.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor that fails validation, or a duplicate.
    pub fn registry(&self) -> std::result::Result<ServiceRegistry, ConfigError> {
        ServiceRegistry::with_overrides(self.services.clone())
    }

    /// Project context from the environment, with this config's region as
    /// fallback.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingEnv`] for `PROJECT_ID` or `ARTIFACT_REPOSITORY`.
    pub fn project_context(
        &self,
        env: &dyn EnvSource,
    ) -> std::result::Result<ProjectContext, ConfigError> {
        ProjectContext::from_env(env, &self.deploy.region)
    }

    /// Resolve the workspace root against `base` when it is relative.
    #[must_use]
    pub fn workspace_root(&self, base: &Path) -> PathBuf {
        if self.deploy.workspace_root.is_absolute() {
            self.deploy.workspace_root.clone()
        } else {
            base.join(&self.deploy.workspace_root)
        }
    }
}

/// Check a session name from config or the command line.
///
/// tmux reads `:` and `.` in a target as window and pane separators, so a
/// session named `dev:main` could never be addressed again.
///
/// # Errors
///
/// [`ConfigError::MissingField`] for a blank name, [`ConfigError::InvalidValue`]
/// for one containing a separator.
pub fn validate_session_name(
    field: &'static str,
    name: &str,
) -> std::result::Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    if name.contains([':', '.']) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "tmux session names cannot contain ':' or '.'".into(),
        });
    }
    Ok(())
}
