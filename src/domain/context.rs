//! Project context supplied by the operator's environment.

use serde::Serialize;

use super::descriptor::ServiceDescriptor;
use crate::error::ConfigError;
use crate::port::outbound::environment::EnvSource;

pub const PROJECT_ID_VAR: &str = "PROJECT_ID";
pub const ARTIFACT_REPOSITORY_VAR: &str = "ARTIFACT_REPOSITORY";
pub const REGION_VAR: &str = "REGION";

pub const DEFAULT_REGION: &str = "us-central1";

/// Cloud project, artifact repository and region a deployment targets.
///
/// Never embedded in descriptors; read from the environment at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    pub project_id: String,
    pub artifact_repository: String,
    pub region: String,
}

impl ProjectContext {
    /// Create a context in the default region.
    #[must_use]
    pub fn new(project_id: impl Into<String>, artifact_repository: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            artifact_repository: artifact_repository.into(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Read the context from `PROJECT_ID`, `ARTIFACT_REPOSITORY` and `REGION`.
    ///
    /// `REGION` falls back to `default_region`; the other two are required.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming the first absent variable.
    pub fn from_env(env: &dyn EnvSource, default_region: &str) -> Result<Self, ConfigError> {
        let require = |name: &str| {
            env.var(name).ok_or_else(|| ConfigError::MissingEnv {
                name: name.to_string(),
            })
        };

        Ok(Self {
            project_id: require(PROJECT_ID_VAR)?,
            artifact_repository: require(ARTIFACT_REPOSITORY_VAR)?,
            region: env
                .var(REGION_VAR)
                .unwrap_or_else(|| default_region.to_string()),
        })
    }

    /// Artifact Registry host for the context's region.
    #[must_use]
    pub fn registry_host(&self) -> String {
        format!("{}-docker.pkg.dev", self.region)
    }

    /// Image reference for a descriptor.
    ///
    /// Depends only on the context and the descriptor, so re-deploying the
    /// same service always targets the same image slot.
    #[must_use]
    pub fn image_ref(&self, descriptor: &ServiceDescriptor) -> String {
        descriptor
            .image_template()
            .replace("{host}", &self.registry_host())
            .replace("{project}", &self.project_id)
            .replace("{repository}", &self.artifact_repository)
            .replace("{region}", &self.region)
            .replace("{name}", descriptor.name())
    }
}
