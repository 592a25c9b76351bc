//! Handler for the `serve-all` command.

use std::collections::HashMap;
use std::time::Duration;

use tokio::signal;
use tracing::info;

use crate::adapter::inbound::cli::command::{ServeArgs, ServeMode};
use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::TmuxMultiplexer;
use crate::application::{
    plan_session, ProcessGroup, ProcessState, ProcessStatus, ServiceRegistry, SessionSupervisor,
};
use crate::error::Result;
use crate::infrastructure::config::{validate_session_name, Config};
use crate::port::outbound::environment::EnvSource;

/// How often the process group is polled for exits.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Start the requested services, or the configured session services.
pub async fn execute(
    args: &ServeArgs,
    config: &Config,
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
) -> Result<()> {
    let services: Vec<String> = if args.services.is_empty() {
        config.session.services.clone()
    } else {
        args.services.clone()
    };
    let session_name = match args.session.as_deref() {
        Some(name) => {
            validate_session_name("--session", name)?;
            name
        }
        None => &config.session.name,
    };

    match args.mode {
        ServeMode::Session => serve_session(registry, env, session_name, &services, args.detach),
        ServeMode::Group => serve_group(registry, env, session_name, &services).await,
    }
}

fn serve_session(
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
    session_name: &str,
    services: &[String],
    detach: bool,
) -> Result<()> {
    let supervisor = SessionSupervisor::new(registry, env, TmuxMultiplexer::new(), session_name);

    if detach {
        output::session_started(&supervisor.launch(services)?);
    } else {
        output::session_detached(&supervisor.start(services)?);
    }
    Ok(())
}

async fn serve_group(
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
    session_name: &str,
    services: &[String],
) -> Result<()> {
    let session = plan_session(registry, env, session_name, services)?;
    let mut group = ProcessGroup::spawn(&session);

    let mut last = HashMap::new();
    report_transitions(&group.status(), &mut last);
    output::hint("press Ctrl-C to stop all services");

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let statuses = group.status();
                report_transitions(&statuses, &mut last);
                if statuses.iter().all(|status| !status.state.is_running()) {
                    info!(session = %session_name, "No services left running");
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!(session = %session_name, "Shutdown signal received");
                break;
            }
        }
    }

    output::processes_stopped(session_name, &group.stop_all().await);
    Ok(())
}

/// Report each service whose state changed since the last poll.
fn report_transitions(statuses: &[ProcessStatus], last: &mut HashMap<String, ProcessState>) {
    for status in statuses {
        if last.get(&status.service) == Some(&status.state) {
            continue;
        }
        output::process_changed(status);
        last.insert(status.service.clone(), status.state.clone());
    }
}
