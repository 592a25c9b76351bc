//! Infrastructure configuration modules.

pub mod logging;
pub mod settings;

pub use logging::LoggingConfig;
pub use settings::{validate_session_name, Config, DeployConfig, SessionConfig};
