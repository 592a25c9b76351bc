//! Deployment controller.
//!
//! Turns a service name into build → push → deploy calls against a
//! [`ContainerPlatform`]. All configuration (descriptor, image reference,
//! secrets) is resolved before the first platform call, so a missing secret
//! or unknown service costs nothing. Nothing is retried: a failure is
//! returned to the operator at the step where it happened.

use std::collections::BTreeMap;

use tracing::{error, info};

use super::registry::ServiceRegistry;
use crate::domain::{DeploymentRequest, ProjectContext, ResolvedSecrets, Revision};
use crate::error::{BuildStage, ConfigError, DeployError};
use crate::port::outbound::environment::EnvSource;
use crate::port::outbound::platform::ContainerPlatform;

pub struct DeploymentController<'a, P: ?Sized> {
    registry: &'a ServiceRegistry,
    platform: &'a P,
    env: &'a dyn EnvSource,
}

impl<'a, P> DeploymentController<'a, P>
where
    P: ContainerPlatform + ?Sized,
{
    #[must_use]
    pub fn new(registry: &'a ServiceRegistry, platform: &'a P, env: &'a dyn EnvSource) -> Self {
        Self {
            registry,
            platform,
            env,
        }
    }

    /// Resolve everything a deploy needs without side effects.
    ///
    /// # Errors
    ///
    /// - [`DeployError::NotFound`] for an unregistered name
    /// - [`ConfigError::NoBuildSource`] for a local-only service
    /// - [`ConfigError::MissingSecret`] for the first absent secret
    pub fn plan(&self, name: &str, ctx: &ProjectContext) -> Result<DeploymentRequest, DeployError> {
        let descriptor = self.registry.lookup(name)?;

        if descriptor.source_dir().is_none() {
            return Err(ConfigError::NoBuildSource(name.to_string()).into());
        }

        let image_ref = ctx.image_ref(descriptor);

        let mut secrets = ResolvedSecrets::default();
        for secret in descriptor.required_secrets() {
            let value = self
                .env
                .var(secret)
                .ok_or_else(|| ConfigError::MissingSecret {
                    service: name.to_string(),
                    name: secret.clone(),
                })?;
            secrets.insert(secret.clone(), value);
        }

        let forwarded: BTreeMap<String, String> = descriptor
            .forwarded_env()
            .iter()
            .filter_map(|key| self.env.var(key).map(|value| (key.clone(), value)))
            .collect();

        Ok(DeploymentRequest {
            descriptor: descriptor.clone(),
            image_ref,
            secrets,
            forwarded,
        })
    }

    /// Build, push and deploy one service.
    ///
    /// Re-deploying the same name targets the same image reference and the
    /// same platform service, producing a new revision rather than a second
    /// service. On failure the previously serving revision is left alone.
    ///
    /// # Errors
    ///
    /// Planning errors (no platform call made), then
    /// [`DeployError::BuildFailure`] for the build or push step (no deploy
    /// issued) or [`DeployError::DeployFailure`].
    pub async fn deploy(&self, name: &str, ctx: &ProjectContext) -> Result<Revision, DeployError> {
        let request = self.plan(name, ctx)?;
        self.execute(&request, ctx).await
    }

    /// Run the platform steps for a planned request.
    ///
    /// # Errors
    ///
    /// See [`deploy`](Self::deploy).
    pub async fn execute(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<Revision, DeployError> {
        let service = request.service();
        let image = request.image_ref.as_str();

        info!(service, image, "Building image");
        self.platform.build(request, ctx).await.map_err(|source| {
            error!(service, image, error = %source, "Build failed");
            DeployError::BuildFailure {
                image: image.to_string(),
                stage: BuildStage::Build,
                source,
            }
        })?;

        info!(service, image, "Pushing image");
        self.platform.push(request).await.map_err(|source| {
            error!(service, image, error = %source, "Push failed");
            DeployError::BuildFailure {
                image: image.to_string(),
                stage: BuildStage::Push,
                source,
            }
        })?;

        info!(service, image, region = %ctx.region, "Deploying");
        let revision = self.platform.deploy(request, ctx).await.map_err(|source| {
            error!(service, error = %source, "Deploy failed; previous revision keeps serving");
            DeployError::DeployFailure {
                service: service.to_string(),
                source,
            }
        })?;

        info!(service, revision = %revision.name, "Deployed");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testkit::platform::{PlatformCall, RecordingPlatform};

    fn ctx() -> ProjectContext {
        ProjectContext::new("mason-b4c0a", "docker-repo")
    }

    #[test]
    fn local_only_service_is_not_deployable() {
        let registry = ServiceRegistry::builtin().unwrap();
        let platform = RecordingPlatform::new();
        let env = HashMap::new();
        let controller = DeploymentController::new(&registry, &platform, &env);

        let err = controller.plan("functions", &ctx()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Configuration(ConfigError::NoBuildSource(_))
        ));
    }

    #[test]
    fn forwarded_env_is_passed_through_unmodified() {
        let registry = ServiceRegistry::builtin().unwrap();
        let platform = RecordingPlatform::new();
        let env: HashMap<String, String> = [("OLLAMA_NUM_PARALLEL".to_string(), "4".to_string())]
            .into_iter()
            .collect();
        let controller = DeploymentController::new(&registry, &platform, &env);

        let request = controller.plan("llm-api", &ctx()).unwrap();
        assert_eq!(
            request.runtime_env().get("OLLAMA_NUM_PARALLEL").map(String::as_str),
            Some("4")
        );
    }

    #[tokio::test]
    async fn push_failure_stops_before_deploy() {
        let registry = ServiceRegistry::builtin().unwrap();
        let platform = RecordingPlatform::new().fail_push("denied: permission");
        let env = HashMap::new();
        let controller = DeploymentController::new(&registry, &platform, &env);

        let err = controller.deploy("vector-db", &ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::BuildFailure {
                stage: BuildStage::Push,
                ..
            }
        ));
        let calls = platform.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[1], PlatformCall::Push { .. }));
    }
}
