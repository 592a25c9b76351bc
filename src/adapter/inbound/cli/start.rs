//! Handler for the `start` command: one service in the foreground.

use std::process::Stdio;

use tokio::process::Command;
use tokio::signal;
use tracing::info;

use crate::adapter::inbound::cli::command::StartArgs;
use crate::adapter::inbound::cli::output;
use crate::application::ServiceRegistry;
use crate::domain::PaneProcess;
use crate::error::{ConfigError, Error, Result};
use crate::port::outbound::environment::EnvSource;

/// Run the service's local command with inherited stdio until it exits.
///
/// Ctrl-C reaches the child through the terminal's process group; this
/// process keeps waiting so the child's exit status is the one reported.
pub async fn execute(args: &StartArgs, registry: &ServiceRegistry, env: &dyn EnvSource) -> Result<()> {
    let descriptor = registry.lookup(&args.service)?;
    let pane = PaneProcess::for_descriptor(descriptor, env)
        .ok_or_else(|| ConfigError::NoLocalCommand(args.service.clone()))?;

    output::service_started(&pane);

    let mut child = Command::new(&pane.command.program)
        .args(&pane.command.args)
        .envs(&pane.command.env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::DownstreamUnavailable {
            service: pane.service_name.clone(),
            reason: format!("failed to launch {}: {e}", pane.command.program),
            exit_code: None,
        })?;
    info!(service = %pane.service_name, pid = ?child.id(), "Service started");

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = signal::ctrl_c() => {
                info!(service = %pane.service_name, "Interrupt received, waiting for service to exit");
            }
        }
    };

    if status.success() {
        info!(service = %pane.service_name, "Service exited");
        output::service_stopped(&pane.service_name);
        return Ok(());
    }

    Err(Error::DownstreamUnavailable {
        service: pane.service_name,
        reason: match status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".into(),
        },
        exit_code: status.code(),
    })
}
