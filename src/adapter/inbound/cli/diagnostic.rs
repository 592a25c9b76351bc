//! Miette-based error diagnostics for CLI error presentation.
//!
//! Every crate error is rendered as one of the diagnostics below, each with
//! a stable code and, where the operator can act on it, a help line.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{ConfigError, DeployError, Error, SessionError};
use crate::port::outbound::multiplexer::MultiplexerError;

/// Configuration or environment problem found before any side effect.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(stackpilot::config))]
pub struct ConfigDiagnostic {
    pub message: String,
    #[help]
    pub help: Option<String>,
}

/// Service name that is not registered.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(
    code(stackpilot::not_found),
    help("run `stackpilot services` to list registered services")
)]
pub struct NotFoundDiagnostic {
    pub message: String,
}

/// Build, push or deploy failure.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(stackpilot::deploy))]
pub struct DeployDiagnostic {
    pub message: String,
    #[help]
    pub help: Option<String>,
}

/// Dev session failure.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(stackpilot::session))]
pub struct SessionDiagnostic {
    pub message: String,
    #[help]
    pub help: Option<String>,
}

/// Anything else: IO, JSON, or a service that exited unsuccessfully.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(stackpilot::runtime))]
pub struct RuntimeDiagnostic {
    pub message: String,
    #[help]
    pub help: Option<String>,
}

/// Convert a crate error into a renderable report.
pub fn report(err: &Error) -> miette::Report {
    let message = err.to_string();
    match err {
        Error::Config(config) => ConfigDiagnostic {
            message,
            help: config_help(config),
        }
        .into(),
        Error::NotFound(_) => NotFoundDiagnostic { message }.into(),
        Error::Deploy(deploy) => match deploy {
            DeployError::NotFound(_) => NotFoundDiagnostic { message }.into(),
            DeployError::Configuration(config) => ConfigDiagnostic {
                message,
                help: config_help(config),
            }
            .into(),
            DeployError::BuildFailure { .. } => DeployDiagnostic {
                message,
                help: Some("re-run with -vv to stream the build output".into()),
            }
            .into(),
            DeployError::DeployFailure { .. } => DeployDiagnostic {
                message,
                help: Some("the previously deployed revision keeps serving traffic".into()),
            }
            .into(),
        },
        Error::Session(session) => match session {
            SessionError::NotFound(_) => NotFoundDiagnostic { message }.into(),
            SessionError::Configuration(config) => ConfigDiagnostic {
                message,
                help: config_help(config),
            }
            .into(),
            SessionError::Cleanup { source, .. }
            | SessionError::Create { source, .. }
            | SessionError::Attach { source, .. } => SessionDiagnostic {
                message,
                help: multiplexer_help(source),
            }
            .into(),
        },
        Error::Multiplexer(source) => SessionDiagnostic {
            message,
            help: multiplexer_help(source),
        }
        .into(),
        Error::DownstreamUnavailable { .. } => RuntimeDiagnostic {
            message,
            help: Some("the service is not restarted; fix the cause and start it again".into()),
        }
        .into(),
        Error::Json(_) | Error::Io(_) => RuntimeDiagnostic {
            message,
            help: None,
        }
        .into(),
    }
}

fn config_help(err: &ConfigError) -> Option<String> {
    match err {
        ConfigError::MissingEnv { name } => Some(format!("export {name} or add it to .env")),
        ConfigError::MissingSecret { name, .. } => Some(format!(
            "export {name} or add it to .env; secrets are never read from the config file"
        )),
        ConfigError::NoLocalCommand(name) => Some(format!(
            "{name} only runs on Cloud Run; use `stackpilot deploy {name}`"
        )),
        ConfigError::NoBuildSource(name) => Some(format!(
            "{name} only runs locally; use `stackpilot start {name}`"
        )),
        ConfigError::EmptySession => {
            Some("list services on the command line or set [session] services".into())
        }
        ConfigError::ReadFile(_) | ConfigError::Parse(_) => {
            Some("check the file passed with --config".into())
        }
        ConfigError::InvalidDescriptor { .. } | ConfigError::DuplicateService(_) => {
            Some("fix the [[services]] entry in the config file".into())
        }
        ConfigError::MissingField { .. } | ConfigError::InvalidValue { .. } => None,
    }
}

fn multiplexer_help(err: &MultiplexerError) -> Option<String> {
    match err {
        MultiplexerError::Spawn { .. } => Some("is tmux installed and on PATH?".into()),
        MultiplexerError::NoSuchSession(_) => Some("start it with `stackpilot serve-all`".into()),
        MultiplexerError::Command { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotFound;

    #[test]
    fn missing_secret_gets_export_hint() {
        let err = Error::Deploy(DeployError::Configuration(ConfigError::MissingSecret {
            service: "transcribe-api".into(),
            name: "HF_TOKEN".into(),
        }));
        let report = report(&err);
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("export HF_TOKEN"));
        assert_eq!(
            report.code().map(|c| c.to_string()).as_deref(),
            Some("stackpilot::config")
        );
    }

    #[test]
    fn unknown_service_points_to_listing() {
        let err = Error::NotFound(NotFound("unknown-service".into()));
        let report = report(&err);
        assert_eq!(report.to_string(), "unknown service 'unknown-service'");
        assert!(report
            .help()
            .map(|h| h.to_string())
            .unwrap_or_default()
            .contains("stackpilot services"));
    }

    #[test]
    fn missing_tmux_is_explained() {
        let err = Error::Session(SessionError::Cleanup {
            session: "dev".into(),
            source: MultiplexerError::Spawn {
                program: "tmux".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        });
        let report = report(&err);
        assert_eq!(
            report.code().map(|c| c.to_string()).as_deref(),
            Some("stackpilot::session")
        );
    }
}
