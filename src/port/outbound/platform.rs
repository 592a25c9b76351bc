//! Container platform port: build, push and deploy.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{DeploymentRequest, ProjectContext, Revision};

/// Errors reported by a platform backend.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to write runtime environment file: {0}")]
    EnvFile(#[source] std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Serverless container platform the controller deploys to.
///
/// Each call runs to completion or failure; there is no cancellation and no
/// retry at this layer.
#[async_trait]
pub trait ContainerPlatform: Send + Sync {
    /// Produce a container image for the request's service, tagged with
    /// `request.image_ref`.
    async fn build(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<(), PlatformError>;

    /// Push the built image to `request.image_ref`.
    async fn push(&self, request: &DeploymentRequest) -> Result<(), PlatformError>;

    /// Deploy the pushed image as a new revision of the named service,
    /// creating the service on first deploy and updating it afterwards.
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<Revision, PlatformError>;
}
