//! In-memory container platform that records calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{DeploymentRequest, ProjectContext, Revision};
use crate::port::outbound::platform::{ContainerPlatform, PlatformError};

/// A call made against [`RecordingPlatform`].
#[derive(Debug, Clone)]
pub enum PlatformCall {
    Build { service: String, image: String },
    Push { image: String },
    Deploy { request: DeploymentRequest },
}

#[derive(Debug, Default)]
struct ServiceState {
    revisions: Vec<String>,
    active: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<PlatformCall>,
    services: BTreeMap<String, ServiceState>,
}

/// Platform fake keyed by service name, like Cloud Run.
///
/// Deploying an existing name adds a revision and moves traffic to it;
/// a failed deploy leaves the active revision unchanged.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    state: Mutex<State>,
    build_failure: Option<String>,
    push_failure: Option<String>,
    deploy_failure: Option<String>,
}

impl RecordingPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fail_build(mut self, reason: impl Into<String>) -> Self {
        self.build_failure = Some(reason.into());
        self
    }

    #[must_use]
    pub fn fail_push(mut self, reason: impl Into<String>) -> Self {
        self.push_failure = Some(reason.into());
        self
    }

    #[must_use]
    pub fn fail_deploy(mut self, reason: impl Into<String>) -> Self {
        self.deploy_failure = Some(reason.into());
        self
    }

    /// Clear a configured deploy failure, e.g. after asserting on it.
    pub fn heal_deploy(&mut self) {
        self.deploy_failure = None;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().calls.clone()
    }

    /// Deployed requests in call order.
    #[must_use]
    pub fn deploys(&self) -> Vec<DeploymentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Deploy { request } => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Number of distinct services on the platform.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.state.lock().services.len()
    }

    #[must_use]
    pub fn revisions(&self, service: &str) -> Vec<String> {
        self.state
            .lock()
            .services
            .get(service)
            .map(|s| s.revisions.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn active_revision(&self, service: &str) -> Option<String> {
        self.state
            .lock()
            .services
            .get(service)
            .and_then(|s| s.active.clone())
    }
}

#[async_trait]
impl ContainerPlatform for RecordingPlatform {
    async fn build(
        &self,
        request: &DeploymentRequest,
        _ctx: &ProjectContext,
    ) -> Result<(), PlatformError> {
        self.state.lock().calls.push(PlatformCall::Build {
            service: request.service().to_string(),
            image: request.image_ref.clone(),
        });
        match &self.build_failure {
            Some(reason) => Err(PlatformError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn push(&self, request: &DeploymentRequest) -> Result<(), PlatformError> {
        self.state.lock().calls.push(PlatformCall::Push {
            image: request.image_ref.clone(),
        });
        match &self.push_failure {
            Some(reason) => Err(PlatformError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn deploy(
        &self,
        request: &DeploymentRequest,
        _ctx: &ProjectContext,
    ) -> Result<Revision, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(PlatformCall::Deploy {
            request: request.clone(),
        });
        if let Some(reason) = &self.deploy_failure {
            return Err(PlatformError::Rejected(reason.clone()));
        }

        let service = state
            .services
            .entry(request.service().to_string())
            .or_default();
        let name = format!("{}-{:05}", request.service(), service.revisions.len() + 1);
        service.revisions.push(name.clone());
        service.active = Some(name.clone());

        Ok(Revision {
            service: request.service().to_string(),
            name,
            image_ref: request.image_ref.clone(),
        })
    }
}
