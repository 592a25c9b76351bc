//! Operator-facing CLI output.
//!
//! Three modes, picked once from the global flags:
//!
//! - text: coloured lines on stdout
//! - `--quiet`: warnings and errors only
//! - `--json`: exactly one JSON document per command on stdout, errors as
//!   `{"type":"error",...}` lines on stderr
//!
//! Handlers describe results through the renderers at the bottom of this
//! module (sessions, processes, deploy plans, revisions, readiness) and never
//! decide the mode themselves. Logs never pass through here; `tracing`
//! writes them to stderr.

use std::fmt::Display;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::adapter::outbound::CommandSpec;
use crate::application::ProcessStatus;
use crate::domain::{DeploymentRequest, PaneProcess, ProjectContext, Revision, Session};
use crate::infrastructure::readiness::{CheckStatus, ReadinessReport};

/// Output mode selected by `--json` and `--quiet`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Text,
    Quiet,
    Json,
}

impl Mode {
    /// `--json` wins over `--quiet`: scripts still need the document.
    #[must_use]
    pub const fn from_flags(json: bool, quiet: bool) -> Self {
        match (json, quiet) {
            (true, _) => Self::Json,
            (false, true) => Self::Quiet,
            (false, false) => Self::Text,
        }
    }
}

static MODE: RwLock<Mode> = parking_lot::const_rwlock(Mode::Text);

pub fn configure(mode: Mode) {
    *MODE.write() = mode;
}

#[must_use]
pub fn mode() -> Mode {
    *MODE.read()
}

#[must_use]
pub fn is_json() -> bool {
    mode() == Mode::Json
}

fn is_text() -> bool {
    mode() == Mode::Text
}

// Primitives. All of them are silent in JSON mode except `warning` and
// `error`, which move to stderr so stdout stays one parseable document.

pub fn header(version: &str) {
    if is_text() {
        println!("{} {}", "stackpilot".bold(), version.dimmed());
        println!();
    }
}

pub fn section(title: &str) {
    if is_text() {
        println!();
        println!("{}", title.bold());
    }
}

/// A label column 14 wide, then the value.
pub fn field(label: &str, value: impl Display) {
    if is_text() {
        println!("  {:<14} {value}", label.dimmed());
    }
}

pub fn success(message: &str) {
    if is_text() {
        println!("  {} {message}", "✓".green());
    }
}

pub fn note(message: &str) {
    if is_text() {
        println!("  {}", message.dimmed());
    }
}

pub fn hint(message: &str) {
    if is_text() {
        println!("  {}: {}", "hint".cyan().dimmed(), message.dimmed());
    }
}

/// Indented block, e.g. a rendered table.
pub fn lines(content: &str) {
    if is_text() {
        for line in content.lines() {
            println!("  {line}");
        }
    }
}

/// Shown in every mode.
pub fn warning(message: &str) {
    match mode() {
        Mode::Json => eprintln!("{}", json!({ "type": "warning", "payload": { "message": message } })),
        Mode::Text | Mode::Quiet => println!("  {} {message}", "⚠".yellow()),
    }
}

/// Shown in every mode, always on stderr.
pub fn error(message: &str) {
    match mode() {
        Mode::Json => eprintln!("{}", json!({ "type": "error", "payload": { "message": message } })),
        Mode::Text | Mode::Quiet => eprintln!("  {} {message}", "×".red()),
    }
}

/// The single stdout document of a JSON-mode command.
pub fn document(value: &Value) {
    if is_json() {
        println!("{value}");
    }
}

#[must_use]
pub fn highlight(value: impl Display) -> String {
    if is_text() {
        value.cyan().to_string()
    } else {
        value.to_string()
    }
}

#[must_use]
pub fn muted(value: impl Display) -> String {
    if is_text() {
        value.dimmed().to_string()
    } else {
        value.to_string()
    }
}

const BRAILLE_SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner for a long step; hidden unless in text mode.
pub fn spinner(message: &str) -> ProgressBar {
    if !is_text() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(BRAILLE_SPINNER)
        .template("  {spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Stop a spinner, leaving a ✓ or × line behind.
pub fn finish(pb: &ProgressBar, ok: bool, message: &str) {
    if pb.is_hidden() {
        return;
    }
    if ok {
        pb.finish_with_message(format!("{} {message}", "✓".green()));
    } else {
        pb.finish_with_message(format!("{} {message}", "×".red()));
    }
}

// Local processes.

/// A foreground service launched by `start`.
pub fn service_started(pane: &PaneProcess) {
    if is_text() {
        println!(
            "  {} {} {}",
            "Starting".bold().cyan(),
            pane.service_name,
            muted(&pane.command)
        );
    }
}

pub fn service_stopped(service: &str) {
    success(&format!("{service} stopped"));
}

/// A multiplexer session laid out by `serve-all --detach`.
pub fn session_started(session: &Session) {
    document(&session_document(session));
    field("session", highlight(session.name()));
    for pane in session.panes() {
        field(&pane.service_name, muted(&pane.command));
    }
    success(&format!("Started {} services", session.panes().len()));
    hint(&format!("attach with `tmux attach -t {}`", session.name()));
}

pub fn session_detached(session: &Session) {
    note(&format!("Detached from {}; services keep running", session.name()));
}

/// Whether the named dev session exists, for `status`.
pub fn session_status(session: &str, running: bool) {
    document(&json!({
        "command": "status",
        "session": session,
        "running": running,
    }));
    field("session", highlight(session));
    if running {
        success("Dev session is running");
        hint(&format!("attach with `tmux attach -t {session}`"));
    } else {
        note("Dev session is not running");
        hint("start it with `stackpilot serve-all`");
    }
}

/// One process-group member whose state changed.
pub fn process_changed(status: &ProcessStatus) {
    if status.state.is_running() {
        if is_text() {
            println!(
                "  {} {} {}",
                "✓".green(),
                status.service.bold(),
                muted(&status.state)
            );
        }
    } else {
        warning(&format!("{} {}", status.service, status.state));
    }
}

/// Final states after the process group has been stopped.
pub fn processes_stopped(session: &str, statuses: &[ProcessStatus]) {
    document(&json!({
        "command": "serve-all",
        "mode": "group",
        "session": session,
        "processes": statuses,
    }));
    section("Stopped");
    for status in statuses {
        field(&status.service, &status.state);
    }
}

// Deploys.

/// What is about to be deployed, shown before the confirmation prompt.
pub fn deploy_summary(request: &DeploymentRequest, ctx: &ProjectContext, builder: impl Display) {
    header(env!("CARGO_PKG_VERSION"));
    field("service", highlight(request.service()));
    field("image", &request.image_ref);
    field("project", &ctx.project_id);
    field("region", &ctx.region);
    field("builder", builder);
    field("resources", resources(request));
    if !request.secrets.is_empty() {
        field("secrets", request.secrets.names().collect::<Vec<_>>().join(", "));
    }
}

/// `deploy --dry-run`: the commands, then the runtime environment the
/// deploy would install with secret values redacted.
pub fn deploy_plan(request: &DeploymentRequest, commands: &[CommandSpec]) {
    document(&plan_document(request, commands));
    for command in commands {
        lines(&command.to_string());
    }
    section("Runtime environment");
    let env = request.redacted_runtime_env();
    if env.is_empty() {
        note("none; the previous revision's variables are cleared");
    }
    for (name, value) in &env {
        field(name, value);
    }
}

pub fn revision(revision: &Revision, region: &str) {
    document(&revision_document(revision, region));
    field("revision", highlight(&revision.name));
    field("image", &revision.image_ref);
}

// Readiness.

pub fn readiness(report: &ReadinessReport, services: usize) {
    document(&readiness_document(report, services));
    section("Readiness");
    field("services", format!("{services} registered"));
    for check in report.checks() {
        let label = if check.critical() {
            format!("{} (critical)", check.name())
        } else {
            check.name().to_string()
        };
        match check.status() {
            CheckStatus::Ready => field(&label, highlight("ready")),
            CheckStatus::NotReady(reason) => field(&label, muted(reason)),
        }
    }
    if report.is_ready() {
        success("Ready");
    }
}

fn resources(request: &DeploymentRequest) -> String {
    let envelope = request.descriptor.envelope();
    match &envelope.gpu {
        Some(gpu) => format!(
            "{} CPU, {} GiB, {} x {}",
            envelope.cpu, envelope.memory_gib, gpu.count, gpu.kind
        ),
        None => format!("{} CPU, {} GiB", envelope.cpu, envelope.memory_gib),
    }
}

fn session_document(session: &Session) -> Value {
    json!({
        "command": "serve-all",
        "mode": "session",
        "session": session.name(),
        "services": session.service_names().collect::<Vec<_>>(),
    })
}

fn plan_document(request: &DeploymentRequest, commands: &[CommandSpec]) -> Value {
    json!({
        "command": "deploy",
        "dry_run": true,
        "service": request.service(),
        "image": request.image_ref,
        "commands": commands.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "runtime_env": request.redacted_runtime_env(),
    })
}

fn revision_document(revision: &Revision, region: &str) -> Value {
    json!({
        "command": "deploy",
        "service": revision.service,
        "revision": revision.name,
        "image": revision.image_ref,
        "region": region,
    })
}

fn readiness_document(report: &ReadinessReport, services: usize) -> Value {
    let checks: Vec<Value> = report
        .checks()
        .iter()
        .map(|check| {
            let (status, reason) = match check.status() {
                CheckStatus::Ready => ("ready", None),
                CheckStatus::NotReady(reason) => ("not_ready", Some(reason.as_str())),
            };
            json!({
                "name": check.name(),
                "critical": check.critical(),
                "status": status,
                "reason": reason,
            })
        })
        .collect();

    json!({
        "command": "check",
        "status": if report.is_ready() { "ready" } else { "not_ready" },
        "services": services,
        "checks": checks,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::application::{DeploymentController, ServiceRegistry};
    use crate::domain::LocalCommand;
    use crate::infrastructure::config::Config;
    use crate::infrastructure::readiness::readiness_check;
    use crate::testkit::platform::RecordingPlatform;

    fn request(name: &str, env: &HashMap<String, String>) -> DeploymentRequest {
        let registry = ServiceRegistry::builtin().unwrap();
        let platform = RecordingPlatform::new();
        DeploymentController::new(&registry, &platform, env)
            .plan(name, &ProjectContext::new("mason-b4c0a", "docker-repo"))
            .unwrap()
    }

    #[test]
    fn json_flag_wins_over_quiet() {
        assert_eq!(Mode::from_flags(true, true), Mode::Json);
        assert_eq!(Mode::from_flags(false, true), Mode::Quiet);
        assert_eq!(Mode::from_flags(false, false), Mode::Text);
    }

    #[test]
    fn plan_document_redacts_runtime_env() {
        let env: HashMap<String, String> =
            [("HF_TOKEN".to_string(), "hf_live_value".to_string())].into_iter().collect();
        let request = request("transcribe-api", &env);
        let commands = vec![CommandSpec::new("gcloud").arg("run").arg("deploy")];

        let doc = plan_document(&request, &commands);
        assert_eq!(doc["dry_run"], true);
        assert_eq!(doc["commands"][0], "gcloud run deploy");
        assert_eq!(doc["runtime_env"]["HF_TOKEN"], "<redacted>");
        assert!(!doc.to_string().contains("hf_live_value"));
    }

    #[test]
    fn resources_name_the_gpu() {
        assert_eq!(
            resources(&request("llm-api", &HashMap::new())),
            "8 CPU, 32 GiB, 1 x nvidia-l4"
        );
        assert_eq!(resources(&request("vector-db", &HashMap::new())), "2 CPU, 4 GiB");
    }

    #[test]
    fn revision_document_carries_region() {
        let revision = Revision {
            service: "llm-api".into(),
            name: "llm-api-00007-abc".into(),
            image_ref: "us-central1-docker.pkg.dev/p/r/llm-api".into(),
        };
        let doc = revision_document(&revision, "us-central1");
        assert_eq!(doc["revision"], "llm-api-00007-abc");
        assert_eq!(doc["region"], "us-central1");
    }

    #[test]
    fn session_document_lists_panes_in_order() {
        let pane = |service: &str| PaneProcess {
            service_name: service.into(),
            command: LocalCommand::new("sleep").arg("1"),
        };
        let session = Session::new("dev", vec![pane("functions"), pane("vector-db")]);
        let doc = session_document(&session);
        assert_eq!(doc["session"], "dev");
        assert_eq!(doc["services"], json!(["functions", "vector-db"]));
    }

    #[test]
    fn readiness_document_reports_failed_checks() {
        let registry = ServiceRegistry::builtin().unwrap();
        let env: HashMap<String, String> = HashMap::new();
        let report = readiness_check(&Config::default(), &registry, &env);

        let doc = readiness_document(&report, registry.len());
        assert_eq!(doc["services"], 5);
        let checks = doc["checks"].as_array().unwrap();
        assert_eq!(checks.len(), report.checks().len());
        assert!(checks
            .iter()
            .any(|check| check["status"] == "not_ready" && check["reason"].is_string()));
    }
}
