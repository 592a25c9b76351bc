//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the seams the orchestration core talks through. Adapters
//! implement them against real tools; the `testkit` feature provides
//! recording fakes.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  Registry · Supervisor  │
//!     ┌──────────────┤  Controller             ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌───────────┐          ┌─────────────┐              ┌─────────────┐
//! │Multiplexer│          │ EnvSource   │              │  Container  │
//! │  (tmux)   │          │ (process)   │              │  Platform   │
//! └───────────┘          └─────────────┘              └─────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`Multiplexer`] - terminal session with one pane per service
//! - [`ContainerPlatform`] - build, push and deploy of container images
//! - [`EnvSource`] - environment lookups for secrets and project context

pub mod outbound;

pub use outbound::environment::{EnvSource, ProcessEnv};
pub use outbound::multiplexer::{Multiplexer, MultiplexerError};
pub use outbound::platform::{ContainerPlatform, PlatformError};
