//! External command execution with streamed output.
//!
//! Every line a tool prints is forwarded to `tracing` as it arrives, so long
//! builds show progress under `-v`. Stdout is collected for callers that
//! parse it; only the tail of stderr is kept, for error reports.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::port::outbound::platform::PlatformError;

/// Stderr lines kept for a failure report.
const STDERR_TAIL_LINES: usize = 20;

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering, used for dry runs and logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", quote(value))?;
        }
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Single-quote an argument when a shell would split or expand it.
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%^".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Output of a command that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
}

impl CommandOutput {
    /// Last non-empty stdout line, trimmed.
    #[must_use]
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }
}

/// Runs [`CommandSpec`]s to completion.
pub struct CommandRunner;

impl CommandRunner {
    /// Run a command, streaming its output to the log.
    ///
    /// # Errors
    ///
    /// [`PlatformError::Spawn`] when the program cannot be started,
    /// [`PlatformError::Failed`] with the stderr tail when it exits non-zero.
    pub async fn run(spec: &CommandSpec) -> Result<CommandOutput, PlatformError> {
        debug!(command = %spec, "Running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout_task = child.stdout.take().map(|out| {
            let program = spec.program.clone();
            tokio::spawn(async move { collect_lines(out, &program, "stdout", usize::MAX).await })
        });
        let stderr_task = child.stderr.take().map(|err| {
            let program = spec.program.clone();
            tokio::spawn(
                async move { collect_lines(err, &program, "stderr", STDERR_TAIL_LINES).await },
            )
        });

        let status = child.wait().await.map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            return Err(PlatformError::Failed {
                program: spec.program.clone(),
                status: status.to_string(),
                stderr: stderr.join("\n"),
            });
        }

        Ok(CommandOutput { stdout })
    }
}

/// Read lines until EOF, logging each and keeping at most `keep`.
async fn collect_lines<R>(reader: R, program: &str, stream: &'static str, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut kept = VecDeque::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "stackpilot::command", program, stream, "{line}");
        if kept.len() == keep {
            kept.pop_front();
        }
        kept.push_back(line);
    }
    kept.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let spec = CommandSpec::new("gcloud")
            .args(["run", "deploy", "llm-api"])
            .arg("--set-env-vars=A=has space");
        assert_eq!(
            spec.to_string(),
            "gcloud run deploy llm-api '--set-env-vars=A=has space'"
        );
    }

    #[test]
    fn display_includes_env_prefix() {
        let spec = CommandSpec::new("docker")
            .arg("push")
            .env("SERVICE_NAME", "vector-db");
        assert_eq!(spec.to_string(), "SERVICE_NAME=vector-db docker push");
    }

    #[test]
    fn last_line_skips_blank_trailer() {
        let output = CommandOutput {
            stdout: vec!["llm-api-00002-abc".into(), "  ".into()],
        };
        assert_eq!(output.last_line(), Some("llm-api-00002-abc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_collects_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo one; echo two"]);
        let output = CommandRunner::run(&spec).await.unwrap();
        assert_eq!(output.stdout, vec!["one".to_string(), "two".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_reports_stderr_on_failure() {
        let spec = CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let err = CommandRunner::run(&spec).await.unwrap_err();
        match err {
            PlatformError::Failed { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_passes_env() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $IMAGE_URL"])
            .env("IMAGE_URL", "registry/app");
        let output = CommandRunner::run(&spec).await.unwrap();
        assert_eq!(output.last_line(), Some("registry/app"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::new("stackpilot-no-such-program");
        let err = CommandRunner::run(&spec).await.unwrap_err();
        assert!(matches!(err, PlatformError::Spawn { .. }));
    }
}
