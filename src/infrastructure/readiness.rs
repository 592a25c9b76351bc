//! Operator readiness reporting for `stackpilot check`.
//!
//! Checks only what can be known locally: configured session services,
//! environment values, secrets and tools on `PATH`. Nothing is contacted.

use std::path::Path;

use crate::adapter::outbound::cloud_run::BuildBackend;
use crate::application::ServiceRegistry;
use crate::domain::context::{ARTIFACT_REPOSITORY_VAR, PROJECT_ID_VAR, REGION_VAR};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::environment::EnvSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Ready,
    NotReady(String),
}

#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    name: String,
    critical: bool,
    status: CheckStatus,
}

impl ReadinessCheck {
    fn new(name: impl Into<String>, critical: bool, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            critical,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn status(&self) -> &CheckStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, CheckStatus::Ready)
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessReport {
    checks: Vec<ReadinessCheck>,
}

impl ReadinessReport {
    pub fn checks(&self) -> &[ReadinessCheck] {
        &self.checks
    }

    /// Ready when every critical check passes.
    pub fn is_ready(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical())
            .all(ReadinessCheck::is_ready)
    }
}

/// Build the report.
///
/// Session services are critical: `serve-all` cannot start without them.
/// Deploy prerequisites and tools are advisory, since an operator may only
/// ever use one side.
pub fn readiness_check(
    config: &Config,
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
) -> ReadinessReport {
    let mut checks = Vec::new();
    let path = env.var("PATH");

    let mut local_programs = Vec::new();
    for name in &config.session.services {
        let status = match registry.lookup(name) {
            Err(err) => CheckStatus::NotReady(err.to_string()),
            Ok(descriptor) => match descriptor.local() {
                None => CheckStatus::NotReady("no local start command".into()),
                Some(local) => {
                    local_programs.push(local.program.clone());
                    CheckStatus::Ready
                }
            },
        };
        checks.push(ReadinessCheck::new(format!("session service {name}"), true, status));
    }

    for var in [PROJECT_ID_VAR, ARTIFACT_REPOSITORY_VAR] {
        checks.push(ReadinessCheck::new(var, false, present(env, var, "required to deploy")));
    }
    checks.push(ReadinessCheck::new(
        REGION_VAR,
        false,
        match env.var(REGION_VAR) {
            Some(_) => CheckStatus::Ready,
            None => CheckStatus::NotReady(format!("unset, using {}", config.deploy.region)),
        },
    ));

    for descriptor in registry.deployable() {
        for secret in descriptor.required_secrets() {
            checks.push(ReadinessCheck::new(
                format!("secret {secret} ({})", descriptor.name()),
                false,
                present(env, secret, "required to deploy this service"),
            ));
        }
    }

    let mut tools = vec!["tmux".to_string(), "gcloud".to_string()];
    if config.deploy.builder == BuildBackend::Docker {
        tools.push("docker".into());
    }
    for program in local_programs {
        if !tools.contains(&program) {
            tools.push(program);
        }
    }
    for tool in tools {
        let status = if find_on_path(&tool, path.as_deref()) {
            CheckStatus::Ready
        } else {
            CheckStatus::NotReady("not found on PATH".into())
        };
        checks.push(ReadinessCheck::new(format!("tool {tool}"), false, status));
    }

    ReadinessReport { checks }
}

fn present(env: &dyn EnvSource, var: &str, why: &str) -> CheckStatus {
    match env.var(var) {
        Some(_) => CheckStatus::Ready,
        None => CheckStatus::NotReady(format!("not set, {why}")),
    }
}

/// Whether `program` resolves to a file, either directly or via `path`.
pub fn find_on_path(program: &str, path: Option<&str>) -> bool {
    if program.contains('/') {
        return Path::new(program).is_file();
    }
    path.is_some_and(|path| {
        std::env::split_paths(path).any(|dir| dir.join(program).is_file())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn default_session_is_ready_without_env() {
        let config = Config::default();
        let registry = config.registry().unwrap();
        let report = readiness_check(&config, &registry, &env(&[]));
        assert!(report.is_ready());
        let secret = report
            .checks()
            .iter()
            .find(|c| c.name() == "secret HF_TOKEN (transcribe-api)")
            .unwrap();
        assert!(!secret.is_ready());
        assert!(!secret.critical());
    }

    #[test]
    fn deploy_only_service_in_session_is_critical() {
        let mut config = Config::default();
        config.session.services = vec!["llm-api".into()];
        let registry = config.registry().unwrap();
        let report = readiness_check(&config, &registry, &env(&[]));
        assert!(!report.is_ready());
    }

    #[test]
    fn unknown_session_service_is_reported() {
        let mut config = Config::default();
        config.session.services = vec!["unknown-service".into()];
        let registry = config.registry().unwrap();
        let report = readiness_check(&config, &registry, &env(&[]));
        let check = &report.checks()[0];
        assert_eq!(
            check.status(),
            &CheckStatus::NotReady("unknown service 'unknown-service'".into())
        );
    }

    #[test]
    fn project_values_are_read_from_env() {
        let config = Config::default();
        let registry = config.registry().unwrap();
        let report = readiness_check(
            &config,
            &registry,
            &env(&[("PROJECT_ID", "p"), ("ARTIFACT_REPOSITORY", "r")]),
        );
        for name in ["PROJECT_ID", "ARTIFACT_REPOSITORY"] {
            let check = report.checks().iter().find(|c| c.name() == name).unwrap();
            assert!(check.is_ready(), "{name} not ready");
        }
    }

    #[test]
    fn find_on_path_searches_each_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tmux"), "").unwrap();
        let path = std::env::join_paths(["/nonexistent", dir.path().to_str().unwrap()])
            .unwrap()
            .into_string()
            .unwrap();
        assert!(find_on_path("tmux", Some(&path)));
        assert!(!find_on_path("gcloud", Some(&path)));
        assert!(!find_on_path("tmux", None));
    }
}
