//! Environment lookups.

use std::collections::HashMap;

/// Source of environment values.
///
/// Empty values count as absent: a secret exported as `HF_TOKEN=` is a
/// configuration error, not an empty credential.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_absent() {
        let env: HashMap<String, String> = [
            ("HF_TOKEN".to_string(), String::new()),
            ("PROJECT_ID".to_string(), "p".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(env.var("HF_TOKEN"), None);
        assert_eq!(env.var("PROJECT_ID").as_deref(), Some("p"));
        assert_eq!(env.var("REGION"), None);
    }
}
