//! Domain types: descriptors, project context, sessions and deployments.

pub mod context;
pub mod deployment;
pub mod descriptor;
pub mod session;

pub use context::{ProjectContext, DEFAULT_REGION};
pub use deployment::{DeploymentRequest, ResolvedSecrets, Revision};
pub use descriptor::{
    DescriptorSpec, GpuSpec, LocalCommand, ResourceEnvelope, ServiceDescriptor,
    DEFAULT_IMAGE_TEMPLATE,
};
pub use session::{PaneProcess, Session, DEFAULT_SESSION_NAME};
