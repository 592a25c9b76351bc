//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`] - the operator CLI driving the application services
//! - [`outbound`] - tmux, Cloud Run and the command runner they share

pub mod inbound;
pub mod outbound;
