//! Application services (use cases).
//!
//! The registry is the shared read path; the supervisor and the process
//! group run services locally; the controller deploys them.

pub mod catalog;
pub mod controller;
pub mod process_group;
pub mod registry;
pub mod supervisor;

pub use controller::DeploymentController;
pub use process_group::{ProcessGroup, ProcessState, ProcessStatus};
pub use registry::ServiceRegistry;
pub use supervisor::{plan_session, SessionSupervisor};
