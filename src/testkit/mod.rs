//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`multiplexer`] - [`RecordingMultiplexer`](multiplexer::RecordingMultiplexer),
//!   an in-memory session table that records every call.
//! - [`platform`] - [`RecordingPlatform`](platform::RecordingPlatform), an
//!   in-memory container platform with per-service revision history.
//! - [`config`] - Canonical environments and contexts.

pub mod config;
pub mod multiplexer;
pub mod platform;
