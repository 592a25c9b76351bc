//! Outbound adapters (driven side).

pub mod cloud_run;
pub mod command;
pub mod tmux;

pub use cloud_run::{BuildBackend, CloudRunPlatform};
pub use command::{CommandOutput, CommandRunner, CommandSpec};
pub use tmux::TmuxMultiplexer;
