//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the external tools the core drives: the
//! terminal multiplexer, the container platform and the process environment.

pub mod environment;
pub mod multiplexer;
pub mod platform;
