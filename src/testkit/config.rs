//! Canonical test environments and contexts.
//!
//! Single source of truth for the project identifiers and environments used
//! across tests.

use std::collections::HashMap;

use crate::domain::ProjectContext;

pub const PROJECT_ID: &str = "mason-b4c0a";
pub const ARTIFACT_REPOSITORY: &str = "docker-repo";

/// Project context in the default region.
#[must_use]
pub fn project() -> ProjectContext {
    ProjectContext::new(PROJECT_ID, ARTIFACT_REPOSITORY)
}

/// Environment built from key/value pairs.
#[must_use]
pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Environment with every built-in secret set.
#[must_use]
pub fn env_with_secrets() -> HashMap<String, String> {
    env(&[("HF_TOKEN", "hf_test_token")])
}
