//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! orchestration logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading, validation and logging setup
//! - [`readiness`] - Local readiness report behind `stackpilot check`

pub mod config;
pub mod readiness;
