//! Service descriptors: the static deployment contract of one service.
//!
//! Descriptors are declared as [`DescriptorSpec`] (the shape used by the
//! built-in catalog and by `[[services]]` entries in the config file) and
//! validated into an immutable [`ServiceDescriptor`]. Validation is the only
//! way to obtain a descriptor, so every registered descriptor upholds the
//! invariants checked in [`DescriptorSpec::validate`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default image reference layout.
///
/// Placeholders are filled from [`ProjectContext`](super::ProjectContext)
/// and the descriptor name.
pub const DEFAULT_IMAGE_TEMPLATE: &str = "{host}/{project}/{repository}/{name}";

const TEMPLATE_PLACEHOLDERS: &[&str] = &["{host}", "{project}", "{repository}", "{name}", "{region}"];

/// Cloud Run rejects service names longer than this.
const MAX_NAME_LEN: usize = 49;

/// Cloud Run request timeout ceiling.
const MAX_TIMEOUT_SECONDS: u32 = 3600;

/// GPU attachment of a deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuSpec {
    /// Number of GPUs per instance.
    pub count: u32,
    /// Accelerator type, e.g. `nvidia-l4`.
    pub kind: String,
}

/// Resource envelope governing one deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEnvelope {
    pub cpu: u32,
    pub memory_gib: u32,
    pub gpu: Option<GpuSpec>,
    pub concurrency: u32,
    pub max_instances: u32,
    pub timeout_seconds: u32,
    pub cpu_throttling_disabled: bool,
    pub allow_unauthenticated: bool,
}

impl ResourceEnvelope {
    /// GPU count, zero for CPU-only services.
    #[must_use]
    pub fn gpu_count(&self) -> u32 {
        self.gpu.as_ref().map_or(0, |gpu| gpu.count)
    }

    #[must_use]
    pub fn gpu_type(&self) -> Option<&str> {
        self.gpu.as_ref().map(|gpu| gpu.kind.as_str())
    }
}

/// Command that runs a service locally inside a dev session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment set for the process. Values can be overridden from the
    /// operator's environment at launch time.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl LocalCommand {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for LocalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Validated, immutable deployment descriptor of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    name: String,
    image_template: String,
    port: u16,
    envelope: ResourceEnvelope,
    required_secrets: Vec<String>,
    forwarded_env: Vec<String>,
    source_dir: Option<PathBuf>,
    local: Option<LocalCommand>,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn image_template(&self) -> &str {
        &self.image_template
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn envelope(&self) -> &ResourceEnvelope {
        &self.envelope
    }

    /// Environment variables that must resolve before any build or deploy.
    #[must_use]
    pub fn required_secrets(&self) -> &[String] {
        &self.required_secrets
    }

    /// Environment variables passed through unmodified to the deployed runtime.
    #[must_use]
    pub fn forwarded_env(&self) -> &[String] {
        &self.forwarded_env
    }

    /// Build context, relative to the workspace root.
    #[must_use]
    pub fn source_dir(&self) -> Option<&PathBuf> {
        self.source_dir.as_ref()
    }

    #[must_use]
    pub fn local(&self) -> Option<&LocalCommand> {
        self.local.as_ref()
    }
}

/// Declared shape of a descriptor, as written in the catalog or config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DescriptorSpec {
    pub name: String,
    #[serde(default = "default_image_template")]
    pub image_template: String,
    pub port: u16,
    pub cpu: u32,
    pub memory_gib: u32,
    #[serde(default)]
    pub gpu_count: u32,
    #[serde(default)]
    pub gpu_type: Option<String>,
    pub concurrency: u32,
    pub max_instances: u32,
    pub timeout_seconds: u32,
    #[serde(default)]
    pub cpu_throttling_disabled: bool,
    #[serde(default)]
    pub allow_unauthenticated: bool,
    #[serde(default)]
    pub required_secrets: Vec<String>,
    #[serde(default)]
    pub forwarded_env: Vec<String>,
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub local: Option<LocalCommand>,
}

fn default_image_template() -> String {
    DEFAULT_IMAGE_TEMPLATE.to_string()
}

impl DescriptorSpec {
    /// Validate the spec into a [`ServiceDescriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDescriptor`] when:
    /// - the name is not a lowercase DNS label
    /// - a GPU type is set without a GPU count, or the reverse
    /// - a GPU service allows more than one concurrent request
    /// - port, cpu, memory, concurrency, max instances or timeout is zero
    /// - the timeout exceeds the platform ceiling
    /// - the image template uses an unknown placeholder or has an
    ///   unbalanced brace
    pub fn validate(self) -> Result<ServiceDescriptor, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDescriptor {
            service: self.name.clone(),
            reason,
        };

        if !is_dns_label(&self.name) {
            return Err(invalid(format!(
                "name must be a lowercase DNS label of at most {MAX_NAME_LEN} characters"
            )));
        }

        let gpu = match (self.gpu_count, self.gpu_type.as_deref()) {
            (0, None) => None,
            (0, Some(kind)) => {
                return Err(invalid(format!("gpu_type '{kind}' set without gpu_count")));
            }
            (_, None) | (_, Some("")) => {
                return Err(invalid("gpu_count set without gpu_type".into()));
            }
            (count, Some(kind)) => Some(GpuSpec {
                count,
                kind: kind.to_string(),
            }),
        };

        if gpu.is_some() && self.concurrency != 1 {
            return Err(invalid(format!(
                "GPU services must serve one request per instance, got concurrency {}",
                self.concurrency
            )));
        }

        for (field, value) in [
            ("port", u32::from(self.port)),
            ("cpu", self.cpu),
            ("memory_gib", self.memory_gib),
            ("concurrency", self.concurrency),
            ("max_instances", self.max_instances),
            ("timeout_seconds", self.timeout_seconds),
        ] {
            if value == 0 {
                return Err(invalid(format!("{field} must be greater than zero")));
            }
        }

        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(invalid(format!(
                "timeout_seconds {} exceeds {MAX_TIMEOUT_SECONDS}",
                self.timeout_seconds
            )));
        }

        if let Some(problem) = template_problem(&self.image_template) {
            return Err(invalid(format!("image_template {problem}")));
        }

        if let Some(secret) = self.required_secrets.iter().find(|s| s.trim().is_empty()) {
            return Err(invalid(format!("empty secret name '{secret}'")));
        }

        if let Some(local) = &self.local {
            if local.program.trim().is_empty() {
                return Err(invalid("local command has an empty program".into()));
            }
        }

        Ok(ServiceDescriptor {
            name: self.name,
            image_template: self.image_template,
            port: self.port,
            envelope: ResourceEnvelope {
                cpu: self.cpu,
                memory_gib: self.memory_gib,
                gpu,
                concurrency: self.concurrency,
                max_instances: self.max_instances,
                timeout_seconds: self.timeout_seconds,
                cpu_throttling_disabled: self.cpu_throttling_disabled,
                allow_unauthenticated: self.allow_unauthenticated,
            },
            required_secrets: self.required_secrets,
            forwarded_env: self.forwarded_env,
            source_dir: self.source_dir,
            local: self.local,
        })
    }
}

fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1] != b'-'
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// First thing wrong with an image template's placeholders, if any.
fn template_problem(template: &str) -> Option<String> {
    let mut rest = template;
    loop {
        let open = rest.find('{');
        let close = rest.find('}');
        match (open, close) {
            (None, None) => return None,
            (None, Some(_)) => return Some("has an unmatched '}'".into()),
            (Some(start), Some(end)) if end < start => {
                return Some("has an unmatched '}'".into());
            }
            (Some(start), None) => {
                return Some(format!("has an unclosed placeholder {}", &rest[start..]));
            }
            (Some(start), Some(end)) => {
                let placeholder = &rest[start..=end];
                if placeholder[1..].contains('{') {
                    return Some(format!("has an unclosed placeholder {placeholder}"));
                }
                if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
                    return Some(format!("uses unknown placeholder {placeholder}"));
                }
                rest = &rest[end + 1..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> DescriptorSpec {
        DescriptorSpec {
            name: name.to_string(),
            image_template: default_image_template(),
            port: 8080,
            cpu: 2,
            memory_gib: 4,
            gpu_count: 0,
            gpu_type: None,
            concurrency: 10,
            max_instances: 2,
            timeout_seconds: 300,
            cpu_throttling_disabled: false,
            allow_unauthenticated: false,
            required_secrets: Vec::new(),
            forwarded_env: Vec::new(),
            source_dir: None,
            local: None,
        }
    }

    #[test]
    fn cpu_only_spec_validates() {
        let descriptor = spec("vector-db").validate().unwrap();
        assert_eq!(descriptor.name(), "vector-db");
        assert_eq!(descriptor.envelope().gpu_count(), 0);
        assert!(descriptor.envelope().gpu_type().is_none());
    }

    #[test]
    fn gpu_service_must_have_concurrency_one() {
        let mut gpu = spec("llm-api");
        gpu.gpu_count = 1;
        gpu.gpu_type = Some("nvidia-l4".into());
        gpu.concurrency = 4;

        let err = gpu.clone().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDescriptor { .. }));

        gpu.concurrency = 1;
        let descriptor = gpu.validate().unwrap();
        assert_eq!(descriptor.envelope().gpu_count(), 1);
        assert_eq!(descriptor.envelope().gpu_type(), Some("nvidia-l4"));
    }

    #[test]
    fn gpu_type_without_count_is_rejected() {
        let mut s = spec("llm-api");
        s.gpu_type = Some("nvidia-l4".into());
        s.concurrency = 1;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("without gpu_count"));
    }

    #[test]
    fn gpu_count_without_type_is_rejected() {
        let mut s = spec("llm-api");
        s.gpu_count = 1;
        s.concurrency = 1;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("without gpu_type"));
    }

    #[test]
    fn names_must_be_dns_labels() {
        for bad in ["", "LLM", "llm_api", "-llm", "llm-", "9llm"] {
            assert!(spec(bad).validate().is_err(), "accepted {bad:?}");
        }
        assert!(spec("llm-api2").validate().is_ok());
    }

    #[test]
    fn zero_sized_envelope_fields_are_rejected() {
        let mut s = spec("vector-db");
        s.max_instances = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("max_instances"));
    }

    #[test]
    fn timeout_above_ceiling_is_rejected() {
        let mut s = spec("vector-db");
        s.timeout_seconds = 3601;
        assert!(s.validate().is_err());
    }

    #[test]
    fn unknown_template_placeholder_is_rejected() {
        let mut s = spec("vector-db");
        s.image_template = "{host}/{tenant}/{name}".into();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("{tenant}"));
    }

    #[test]
    fn unbalanced_template_braces_are_rejected() {
        for template in ["{host}/{project", "{host}/{project/{name}", "{host}/project}/{name}"] {
            let mut s = spec("vector-db");
            s.image_template = template.into();
            assert!(s.validate().is_err(), "{template} accepted");
        }

        let mut s = spec("vector-db");
        s.image_template = "{host}/{project".into();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("unclosed placeholder {project"));
    }

    #[test]
    fn local_command_displays_program_and_args() {
        let cmd = LocalCommand::new("ollama").arg("serve").env("OLLAMA_HOST", "0.0.0.0");
        assert_eq!(cmd.to_string(), "ollama serve");
        assert_eq!(cmd.env.get("OLLAMA_HOST").map(String::as_str), Some("0.0.0.0"));
    }
}
