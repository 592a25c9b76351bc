//! Process-group supervisor.
//!
//! Runs each pane of a [`Session`] as a child process owned by the group,
//! without a terminal multiplexer. Children are independent: one exiting or
//! failing to launch never touches its siblings. Output lines are forwarded
//! to the log with the owning service attached.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::{PaneProcess, Session};

/// Time the group gets to exit after SIGTERM before survivors are killed.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// Observed state of one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessState {
    Running { pid: Option<u32> },
    Exited { code: Option<i32> },
    FailedToLaunch { reason: String },
}

impl ProcessState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running { pid: Some(pid) } => write!(f, "running (pid {pid})"),
            Self::Running { pid: None } => write!(f, "running"),
            Self::Exited { code: Some(code) } => write!(f, "exited ({code})"),
            Self::Exited { code: None } => write!(f, "exited (signal)"),
            Self::FailedToLaunch { reason } => write!(f, "failed to launch: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub service: String,
    pub state: ProcessState,
}

enum Handle {
    Live(Child),
    Done(ProcessState),
}

struct ManagedProcess {
    service: String,
    handle: Handle,
}

impl ManagedProcess {
    fn poll(&mut self) -> ProcessState {
        if let Handle::Live(child) = &mut self.handle {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let state = ProcessState::Exited {
                        code: status.code(),
                    };
                    warn!(service = %self.service, %state, "Process exited");
                    self.handle = Handle::Done(state);
                }
                Ok(None) => return ProcessState::Running { pid: child.id() },
                Err(e) => {
                    warn!(service = %self.service, error = %e, "Failed to poll process");
                    return ProcessState::Running { pid: child.id() };
                }
            }
        }
        match &self.handle {
            Handle::Done(state) => state.clone(),
            Handle::Live(child) => ProcessState::Running { pid: child.id() },
        }
    }

    /// Ask a live child to exit; reaped later by [`reap`](Self::reap).
    fn signal(&mut self) {
        if matches!(self.poll(), ProcessState::Running { .. }) {
            if let Handle::Live(child) = &mut self.handle {
                terminate(child);
            }
        }
    }

    async fn reap(&mut self, deadline: Instant) -> ProcessState {
        let Handle::Live(child) = &mut self.handle else {
            return self.poll();
        };

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(service = %self.service, "Process ignored SIGTERM, killing");
                if let Err(e) = child.start_kill() {
                    warn!(service = %self.service, error = %e, "Failed to kill process");
                }
                child.wait().await
            }
        };

        let state = match status {
            Ok(status) => ProcessState::Exited {
                code: status.code(),
            },
            Err(e) => {
                warn!(service = %self.service, error = %e, "Failed to reap process");
                ProcessState::Exited { code: None }
            }
        };
        info!(service = %self.service, %state, "Process stopped");
        self.handle = Handle::Done(state.clone());
        state
    }
}

/// Owned handles to one child process per service.
pub struct ProcessGroup {
    processes: Vec<ManagedProcess>,
    stop_grace: Duration,
}

impl ProcessGroup {
    /// Launch every pane of `session` in order.
    ///
    /// A pane that cannot be launched is recorded as
    /// [`ProcessState::FailedToLaunch`]; the remaining panes still start.
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(session: &Session) -> Self {
        let processes = session
            .panes()
            .iter()
            .map(|pane| {
                let handle = match launch(pane) {
                    Ok(child) => {
                        info!(service = %pane.service_name, pid = ?child.id(), command = %pane.command, "Started process");
                        Handle::Live(child)
                    }
                    Err(e) => {
                        warn!(service = %pane.service_name, error = %e, "Failed to start process");
                        Handle::Done(ProcessState::FailedToLaunch {
                            reason: e.to_string(),
                        })
                    }
                };
                ManagedProcess {
                    service: pane.service_name.clone(),
                    handle,
                }
            })
            .collect();

        Self {
            processes,
            stop_grace: STOP_GRACE,
        }
    }

    /// Replace the shared SIGTERM grace period used by [`stop_all`](Self::stop_all).
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Current state of every child, in launch order.
    pub fn status(&mut self) -> Vec<ProcessStatus> {
        self.processes
            .iter_mut()
            .map(|p| ProcessStatus {
                service: p.service.clone(),
                state: p.poll(),
            })
            .collect()
    }

    /// Number of children still running.
    pub fn running(&mut self) -> usize {
        self.status().iter().filter(|s| s.state.is_running()).count()
    }

    /// Stop every running child and reap it.
    ///
    /// All children get SIGTERM at once and share one grace period; any
    /// still running when it ends get SIGKILL. Shutdown therefore takes at
    /// most one grace period however many children there are.
    pub async fn stop_all(&mut self) -> Vec<ProcessStatus> {
        for process in &mut self.processes {
            process.signal();
        }

        let deadline = Instant::now() + self.stop_grace;
        let mut statuses = Vec::with_capacity(self.processes.len());
        for process in &mut self.processes {
            let state = process.reap(deadline).await;
            statuses.push(ProcessStatus {
                service: process.service.clone(),
                state,
            });
        }
        statuses
    }
}

fn launch(pane: &PaneProcess) -> std::io::Result<Child> {
    let mut child = Command::new(&pane.command.program)
        .args(&pane.command.args)
        .envs(&pane.command.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(pane.service_name.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(pane.service_name.clone(), "stderr", stderr);
    }
    Ok(child)
}

fn forward_lines<R>(service: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "stackpilot::pane", service = %service, stream, "{line}");
        }
    });
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SIGTERM lets `docker run --rm` clients stop their container.
        let pid = pid as libc::pid_t;
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
