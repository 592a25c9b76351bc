//! Deployment request and the revision it produces.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::descriptor::ServiceDescriptor;

const REDACTED: &str = "<redacted>";

/// Secret values resolved from the environment for one deployment.
///
/// Values never appear in `Debug` output or serialized form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedSecrets(BTreeMap<String, String>);

impl ResolvedSecrets {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, REDACTED)))
            .finish()
    }
}

impl Serialize for ResolvedSecrets {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.keys())
    }
}

/// Everything one `deploy()` call needs, computed up front and then consumed.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRequest {
    pub descriptor: ServiceDescriptor,
    pub image_ref: String,
    pub secrets: ResolvedSecrets,
    /// Forwarded variables present in the operator's environment.
    pub forwarded: BTreeMap<String, String>,
}

impl DeploymentRequest {
    #[must_use]
    pub fn service(&self) -> &str {
        self.descriptor.name()
    }

    /// Runtime environment for the deployed service: forwarded variables
    /// first, then secrets (a secret wins over a forwarded variable of the
    /// same name).
    #[must_use]
    pub fn runtime_env(&self) -> BTreeMap<String, String> {
        let mut env = self.forwarded.clone();
        for (name, value) in self.secrets.iter() {
            env.insert(name.to_string(), value.to_string());
        }
        env
    }

    /// Whether a runtime variable carries a secret value.
    #[must_use]
    pub fn is_secret(&self, name: &str) -> bool {
        self.secrets.get(name).is_some()
    }

    /// [`runtime_env`](Self::runtime_env) with secret values replaced, for
    /// display.
    #[must_use]
    pub fn redacted_runtime_env(&self) -> BTreeMap<String, String> {
        let mut env = self.runtime_env();
        for (name, value) in &mut env {
            if self.is_secret(name) {
                *value = REDACTED.to_string();
            }
        }
        env
    }
}

/// A deployed, versioned instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub service: String,
    pub name: String,
    pub image_ref: String,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.image_ref)
    }
}
