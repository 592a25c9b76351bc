use thiserror::Error;

use crate::port::outbound::multiplexer::MultiplexerError;
use crate::port::outbound::platform::PlatformError;

/// Configuration-related errors with structured variants.
///
/// Raised before any side effect: a missing environment value, a secret that
/// does not resolve, or a descriptor that breaks a registry invariant.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("missing environment variable {name}")]
    MissingEnv { name: String },

    #[error("service '{service}' requires secret {name}, which is not set")]
    MissingSecret { service: String, name: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid descriptor '{service}': {reason}")]
    InvalidDescriptor { service: String, reason: String },

    #[error("service '{0}' is registered more than once")]
    DuplicateService(String),

    #[error("service '{0}' has no local start command")]
    NoLocalCommand(String),

    #[error("service '{0}' has no build source")]
    NoBuildSource(String),

    #[error("no services given for the dev session")]
    EmptySession,

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Lookup of a service name that is not registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown service '{0}'")]
pub struct NotFound(pub String);

/// Stage of the build pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Build,
    Push,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Errors returned by the deployment controller.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("{stage} failed for {image}: {source}")]
    BuildFailure {
        image: String,
        stage: BuildStage,
        #[source]
        source: PlatformError,
    },

    #[error("deploy failed for service '{service}': {source}")]
    DeployFailure {
        service: String,
        #[source]
        source: PlatformError,
    },
}

/// Errors returned by the dev session supervisor.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("failed to clear previous session '{session}': {source}")]
    Cleanup {
        session: String,
        #[source]
        source: MultiplexerError,
    },

    #[error("failed to create session '{session}': {source}")]
    Create {
        session: String,
        #[source]
        source: MultiplexerError,
    },

    #[error("failed to attach to session '{session}': {source}")]
    Attach {
        session: String,
        #[source]
        source: MultiplexerError,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Multiplexer(#[from] MultiplexerError),

    /// A supervised service exited unsuccessfully. Reported, never retried.
    #[error("{service} is unavailable: {reason}")]
    DownstreamUnavailable {
        service: String,
        reason: String,
        exit_code: Option<i32>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code for this error: the service's own code when it
    /// exited unsuccessfully, otherwise 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DownstreamUnavailable {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        // dialoguer::Error wraps an IO error
        Error::Io(std::io::Error::other(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_names_service_and_variable() {
        let err = ConfigError::MissingSecret {
            service: "transcribe-api".into(),
            name: "HF_TOKEN".into(),
        };
        assert_eq!(
            err.to_string(),
            "service 'transcribe-api' requires secret HF_TOKEN, which is not set"
        );
    }

    #[test]
    fn deploy_error_is_transparent_over_lookup() {
        let err: DeployError = NotFound("unknown-service".into()).into();
        assert_eq!(err.to_string(), "unknown service 'unknown-service'");
    }

    #[test]
    fn downstream_exit_code_is_propagated() {
        let err = Error::DownstreamUnavailable {
            service: "vector-db".into(),
            reason: "exited with status 125".into(),
            exit_code: Some(125),
        };
        assert_eq!(err.exit_code(), 125);
        assert_eq!(Error::from(NotFound("x".into())).exit_code(), 1);
    }

    #[test]
    fn build_failure_reports_stage() {
        let err = DeployError::BuildFailure {
            image: "us-central1-docker.pkg.dev/p/r/llm-api".into(),
            stage: BuildStage::Push,
            source: PlatformError::Rejected("denied".into()),
        };
        assert!(err.to_string().starts_with("push failed for"));
    }
}
