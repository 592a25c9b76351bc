//! Dev session layout: one pane per locally running service.

use serde::Serialize;

use super::descriptor::{LocalCommand, ServiceDescriptor};
use crate::port::outbound::environment::EnvSource;

pub const DEFAULT_SESSION_NAME: &str = "stackpilot";

/// One locally supervised process bound to one pane of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneProcess {
    pub service_name: String,
    pub command: LocalCommand,
}

impl PaneProcess {
    /// Build the pane for a descriptor's local command.
    ///
    /// Declared environment values are replaced by the operator's environment
    /// when it sets the same key (e.g. `FIREBASE_AUTH_EMULATOR_HOST`).
    /// Returns `None` when the descriptor has no local command.
    #[must_use]
    pub fn for_descriptor(descriptor: &ServiceDescriptor, env: &dyn EnvSource) -> Option<Self> {
        let mut command = descriptor.local()?.clone();
        for (key, value) in command.env.iter_mut() {
            if let Some(overridden) = env.var(key) {
                *value = overridden;
            }
        }
        Some(Self {
            service_name: descriptor.name().to_string(),
            command,
        })
    }
}

/// Named multiplexer session with its panes in launch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    name: String,
    panes: Vec<PaneProcess>,
}

impl Session {
    #[must_use]
    pub fn new(name: impl Into<String>, panes: Vec<PaneProcess>) -> Self {
        Self {
            name: name.into(),
            panes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn panes(&self) -> &[PaneProcess] {
        &self.panes
    }

    /// Service names in pane order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.panes.iter().map(|pane| pane.service_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::application::catalog;

    #[test]
    fn pane_takes_declared_env_by_default() {
        let descriptor = catalog::functions().validate().unwrap();
        let pane = PaneProcess::for_descriptor(&descriptor, &HashMap::new()).unwrap();
        assert_eq!(pane.service_name, "functions");
        assert_eq!(
            pane.command.env.get("FIREBASE_AUTH_EMULATOR_HOST").map(String::as_str),
            Some("127.0.0.1:9099")
        );
    }

    #[test]
    fn operator_environment_overrides_declared_env() {
        let descriptor = catalog::functions().validate().unwrap();
        let env: HashMap<String, String> = [(
            "FIREBASE_AUTH_EMULATOR_HOST".to_string(),
            "127.0.0.1:9199".to_string(),
        )]
        .into_iter()
        .collect();
        let pane = PaneProcess::for_descriptor(&descriptor, &env).unwrap();
        assert_eq!(
            pane.command.env.get("FIREBASE_AUTH_EMULATOR_HOST").map(String::as_str),
            Some("127.0.0.1:9199")
        );
    }

    #[test]
    fn deploy_only_service_has_no_pane() {
        let descriptor = catalog::llm_api().validate().unwrap();
        assert!(PaneProcess::for_descriptor(&descriptor, &HashMap::new()).is_none());
    }
}
