//! Stackpilot - local dev sessions and Cloud Run deploys for a
//! retrieval-and-inference backend.
//!
//! A fixed registry of service descriptors (embeddings, vector database,
//! LLM, transcription, functions) drives two workflows:
//!
//! - **Dev session** - start the local services side by side, one tmux pane
//!   each, or as an owned process group
//! - **Deploy** - build, push and deploy one service to Cloud Run with the
//!   resource envelope, secrets and GPU attachment its descriptor declares
//!
//! # Modules
//!
//! - [`domain`] - Descriptors, project context, sessions and deployments
//! - [`application`] - Registry, session supervisor, process group, deploy controller
//! - [`port`] - Traits for the multiplexer, the container platform and the environment
//! - [`adapter`] - tmux and gcloud/docker backends, and the CLI
//! - [`infrastructure`] - Configuration, logging and readiness checks
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use stackpilot::application::ServiceRegistry;
//!
//! let registry = ServiceRegistry::builtin()?;
//! let llm = registry.lookup("llm-api")?;
//! assert_eq!(llm.envelope().gpu_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
