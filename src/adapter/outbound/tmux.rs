//! tmux backend for the dev session.
//!
//! Shells out to the `tmux` binary. Argument lists are built by pure
//! functions so the exact invocations can be checked without a tmux server.

use std::process::{Command, Output};

use tracing::debug;

use crate::domain::PaneProcess;
use crate::port::outbound::multiplexer::{Multiplexer, MultiplexerError};

/// Set by tmux inside a session; attaching from there would nest sessions.
const TMUX_ENV: &str = "TMUX";

/// Stderr fragments tmux prints when the target session or server is absent.
const ABSENT_MARKERS: &[&str] = &[
    "can't find session",
    "no server running",
    "no such session",
    "error connecting to",
    "session not found",
];

/// Drives a tmux server through its command-line client.
#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    program: String,
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("tmux")
    }

    /// Use a different client binary, e.g. an absolute path.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn output(&self, args: &[String]) -> Result<Output, MultiplexerError> {
        debug!(program = %self.program, ?args, "Running tmux");
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| self.spawn_error(source))
    }

    fn run(&self, action: &'static str, session: &str, args: &[String]) -> Result<(), MultiplexerError> {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_absent(&stderr) {
            return Err(MultiplexerError::NoSuchSession(session.to_string()));
        }
        Err(MultiplexerError::Command {
            action,
            reason: if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            },
        })
    }

    fn spawn_error(&self, source: std::io::Error) -> MultiplexerError {
        MultiplexerError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Multiplexer for TmuxMultiplexer {
    fn kill_session(&self, session: &str) -> Result<(), MultiplexerError> {
        self.run("kill-session", session, &kill_session_args(session))
    }

    fn has_session(&self, session: &str) -> Result<bool, MultiplexerError> {
        let output = self.output(&has_session_args(session))?;
        Ok(output.status.success())
    }

    fn new_session(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        self.run("new-session", session, &new_session_args(session, pane))
    }

    fn split_window(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        self.run("split-window", session, &split_window_args(session, pane))
    }

    fn select_tiled_layout(&self, session: &str) -> Result<(), MultiplexerError> {
        self.run("select-layout", session, &select_layout_args(session))
    }

    fn attach(&self, session: &str) -> Result<(), MultiplexerError> {
        let nested = std::env::var_os(TMUX_ENV).is_some();
        let args = attach_args(session, nested);
        debug!(program = %self.program, ?args, "Attaching");

        // Inherit the terminal; blocks until the operator detaches.
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|source| self.spawn_error(source))?;
        if status.success() {
            Ok(())
        } else {
            Err(MultiplexerError::Command {
                action: "attach-session",
                reason: status.to_string(),
            })
        }
    }
}

fn is_absent(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    ABSENT_MARKERS.iter().any(|marker| stderr.contains(marker))
}

/// Exact-match target, so `dev` never resolves to a session named `dev2`.
fn exact(session: &str) -> String {
    format!("={session}")
}

/// Exact-match target for the session's current window. Window commands
/// given a bare name would also accept a window called `dev` elsewhere.
fn window(session: &str) -> String {
    format!("={session}:")
}

pub fn kill_session_args(session: &str) -> Vec<String> {
    vec!["kill-session".into(), "-t".into(), exact(session)]
}

pub fn has_session_args(session: &str) -> Vec<String> {
    vec!["has-session".into(), "-t".into(), exact(session)]
}

/// `new-session` chained with `remain-on-exit`, so a crashed first pane
/// stays visible instead of closing the session.
pub fn new_session_args(session: &str, pane: &PaneProcess) -> Vec<String> {
    let mut args: Vec<String> = vec!["new-session".into(), "-d".into(), "-s".into(), session.into()];
    args.extend(pane_args(pane));
    args.extend([
        ";".into(),
        "set-option".into(),
        "-w".into(),
        "-t".into(),
        window(session),
        "remain-on-exit".into(),
        "on".into(),
    ]);
    args
}

pub fn split_window_args(session: &str, pane: &PaneProcess) -> Vec<String> {
    let mut args: Vec<String> = vec!["split-window".into(), "-t".into(), window(session)];
    args.extend(pane_args(pane));
    args
}

pub fn select_layout_args(session: &str) -> Vec<String> {
    vec![
        "select-layout".into(),
        "-t".into(),
        window(session),
        "tiled".into(),
    ]
}

pub fn attach_args(session: &str, nested: bool) -> Vec<String> {
    let verb = if nested { "switch-client" } else { "attach-session" };
    vec![verb.into(), "-t".into(), exact(session)]
}

/// Environment flags, then the command as separate arguments.
fn pane_args(pane: &PaneProcess) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in &pane.command.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(pane.command.program.clone());
    args.extend(pane.command.args.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocalCommand;

    fn pane(service: &str, command: LocalCommand) -> PaneProcess {
        PaneProcess {
            service_name: service.to_string(),
            command,
        }
    }

    #[test]
    fn new_session_runs_first_pane_detached() {
        let pane = pane(
            "functions",
            LocalCommand::new("firebase")
                .arg("emulators:start")
                .env("FIREBASE_AUTH_EMULATOR_HOST", "127.0.0.1:9099"),
        );
        let args = new_session_args("dev", &pane);
        assert_eq!(
            args,
            vec![
                "new-session",
                "-d",
                "-s",
                "dev",
                "-e",
                "FIREBASE_AUTH_EMULATOR_HOST=127.0.0.1:9099",
                "firebase",
                "emulators:start",
                ";",
                "set-option",
                "-w",
                "-t",
                "=dev:",
                "remain-on-exit",
                "on",
            ]
        );
    }

    #[test]
    fn window_commands_use_exact_window_target() {
        let pane = pane("embeddings-api", LocalCommand::new("ollama").arg("serve"));
        assert_eq!(
            split_window_args("dev", &pane),
            vec!["split-window", "-t", "=dev:", "ollama", "serve"]
        );
        assert_eq!(
            select_layout_args("dev"),
            vec!["select-layout", "-t", "=dev:", "tiled"]
        );
    }

    #[test]
    fn kill_uses_exact_target() {
        assert_eq!(kill_session_args("dev"), vec!["kill-session", "-t", "=dev"]);
        assert_eq!(has_session_args("dev"), vec!["has-session", "-t", "=dev"]);
    }

    #[test]
    fn attach_switches_client_when_nested() {
        assert_eq!(attach_args("dev", false)[0], "attach-session");
        assert_eq!(attach_args("dev", true)[0], "switch-client");
    }

    #[test]
    fn absent_session_messages_are_recognised() {
        assert!(is_absent("can't find session: dev"));
        assert!(is_absent("no server running on /tmp/tmux-1000/default"));
        assert!(is_absent("error connecting to /tmp/tmux-1000/default (No such file or directory)"));
        assert!(!is_absent("server exited unexpectedly"));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let tmux = TmuxMultiplexer::with_program("stackpilot-no-such-tmux");
        let err = tmux.kill_session("dev").unwrap_err();
        assert!(matches!(err, MultiplexerError::Spawn { .. }));
    }
}
