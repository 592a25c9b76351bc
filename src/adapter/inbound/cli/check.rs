//! Local readiness check.

use crate::adapter::inbound::cli::output;
use crate::application::ServiceRegistry;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::Config;
use crate::infrastructure::readiness::readiness_check;
use crate::port::outbound::environment::EnvSource;

/// Print the readiness report; fails when a critical check fails.
pub fn execute(config: &Config, registry: &ServiceRegistry, env: &dyn EnvSource) -> Result<()> {
    let report = readiness_check(config, registry, env);
    output::readiness(&report, registry.len());

    if !report.is_ready() {
        output::error("Readiness check failed");
        return Err(ConfigError::InvalidValue {
            field: "session.services",
            reason: "a configured session service cannot run locally".into(),
        }
        .into());
    }
    Ok(())
}
