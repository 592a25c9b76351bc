//! Service listing.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::output::{self, Mode};
use crate::application::catalog::endpoints;
use crate::application::ServiceRegistry;
use crate::domain::ServiceDescriptor;
use crate::error::Result;

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "CPU")]
    cpu: u32,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "GPU")]
    gpu: String,
    #[tabled(rename = "Concurrency")]
    concurrency: u32,
    #[tabled(rename = "Max")]
    max_instances: u32,
    #[tabled(rename = "Timeout")]
    timeout: String,
    #[tabled(rename = "Runs")]
    runs: String,
}

impl From<&ServiceDescriptor> for ServiceRow {
    fn from(descriptor: &ServiceDescriptor) -> Self {
        let envelope = descriptor.envelope();
        Self {
            name: descriptor.name().to_string(),
            port: descriptor.port(),
            cpu: envelope.cpu,
            memory: format!("{} GiB", envelope.memory_gib),
            gpu: envelope
                .gpu
                .as_ref()
                .map_or_else(|| "-".to_string(), |gpu| format!("{} x {}", gpu.count, gpu.kind)),
            concurrency: envelope.concurrency,
            max_instances: envelope.max_instances,
            timeout: format!("{}s", envelope.timeout_seconds),
            runs: runs(descriptor),
        }
    }
}

/// Where a service can run: locally, on Cloud Run, or both.
fn runs(descriptor: &ServiceDescriptor) -> String {
    match (descriptor.local().is_some(), descriptor.source_dir().is_some()) {
        (true, true) => "local, cloud".into(),
        (true, false) => "local".into(),
        (false, true) => "cloud".into(),
        (false, false) => "-".into(),
    }
}

/// List registered services in registration order.
pub fn execute(registry: &ServiceRegistry) -> Result<()> {
    if output::mode() == Mode::Quiet {
        return Ok(());
    }

    if output::is_json() {
        let services = registry
            .descriptors()
            .iter()
            .map(|descriptor| {
                let envelope = descriptor.envelope();
                json!({
                    "name": descriptor.name(),
                    "port": descriptor.port(),
                    "cpu": envelope.cpu,
                    "memory_gib": envelope.memory_gib,
                    "gpu_count": envelope.gpu_count(),
                    "gpu_type": envelope.gpu_type(),
                    "concurrency": envelope.concurrency,
                    "max_instances": envelope.max_instances,
                    "timeout_seconds": envelope.timeout_seconds,
                    "cpu_throttling_disabled": envelope.cpu_throttling_disabled,
                    "allow_unauthenticated": envelope.allow_unauthenticated,
                    "required_secrets": descriptor.required_secrets(),
                    "local": descriptor.local().map(ToString::to_string),
                    "deployable": descriptor.source_dir().is_some(),
                    "routes": endpoints::routes(descriptor.name()),
                })
            })
            .collect::<Vec<_>>();
        output::document(&json!({
            "command": "services",
            "services": services,
        }));
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::section("Registered services");

    let rows: Vec<ServiceRow> = registry.descriptors().iter().map(ServiceRow::from).collect();
    output::lines(&Table::new(rows).to_string());

    for descriptor in registry.descriptors() {
        if !descriptor.required_secrets().is_empty() {
            output::note(&format!(
                "{} requires {}",
                descriptor.name(),
                descriptor.required_secrets().join(", ")
            ));
        }
    }
    Ok(())
}
