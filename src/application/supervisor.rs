//! Dev session supervisor.
//!
//! Lays out one multiplexer pane per service, in the order the caller gives,
//! inside a single named session. Every `start` first clears a previous
//! session with the same name, so restarting never leaves two sessions
//! running side by side.

use tracing::{debug, info};

use super::registry::ServiceRegistry;
use crate::domain::{PaneProcess, Session};
use crate::error::{ConfigError, SessionError};
use crate::port::outbound::environment::EnvSource;
use crate::port::outbound::multiplexer::{Multiplexer, MultiplexerError};

/// Resolve an ordered list of service names into a session layout.
///
/// Shared by the multiplexer supervisor and the process group, so both
/// reject the same inputs before launching anything.
///
/// # Errors
///
/// - [`ConfigError::EmptySession`] for an empty list
/// - `NotFound` for an unregistered name
/// - [`ConfigError::NoLocalCommand`] for a deploy-only service
pub fn plan_session<S: AsRef<str>>(
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
    session_name: &str,
    names: &[S],
) -> Result<Session, SessionError> {
    if names.is_empty() {
        return Err(ConfigError::EmptySession.into());
    }

    let panes = names
        .iter()
        .map(|name| -> Result<PaneProcess, SessionError> {
            let descriptor = registry.lookup(name.as_ref())?;
            PaneProcess::for_descriptor(descriptor, env).ok_or_else(|| {
                SessionError::from(ConfigError::NoLocalCommand(name.as_ref().to_string()))
            })
        })
        .collect::<Result<Vec<_>, SessionError>>()?;

    Ok(Session::new(session_name, panes))
}

/// Drives a [`Multiplexer`] to run a set of local services.
pub struct SessionSupervisor<'a, M> {
    registry: &'a ServiceRegistry,
    env: &'a dyn EnvSource,
    multiplexer: M,
    session_name: String,
}

impl<'a, M: Multiplexer> SessionSupervisor<'a, M> {
    #[must_use]
    pub fn new(
        registry: &'a ServiceRegistry,
        env: &'a dyn EnvSource,
        multiplexer: M,
        session_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            env,
            multiplexer,
            session_name: session_name.into(),
        }
    }

    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    #[must_use]
    pub fn multiplexer(&self) -> &M {
        &self.multiplexer
    }

    /// Resolve the panes for `names` without touching the multiplexer.
    ///
    /// # Errors
    ///
    /// See [`plan_session`].
    pub fn plan<S: AsRef<str>>(&self, names: &[S]) -> Result<Session, SessionError> {
        plan_session(self.registry, self.env, &self.session_name, names)
    }

    /// Start the session and attach to it.
    ///
    /// Blocks until the operator detaches and returns the session that was
    /// laid out. A pane whose process crashes does not fail this call.
    ///
    /// # Errors
    ///
    /// Fails on planning errors (before any multiplexer call), when a
    /// previous session cannot be cleared for a reason other than being
    /// absent, or when the session or a pane cannot be created.
    pub fn start<S: AsRef<str>>(&self, names: &[S]) -> Result<Session, SessionError> {
        let session = self.launch(names)?;

        info!(session = %session.name(), "Attaching to session");
        self.multiplexer
            .attach(session.name())
            .map_err(|source| SessionError::Attach {
                session: session.name().to_string(),
                source,
            })?;

        info!(session = %session.name(), "Detached from session");
        Ok(session)
    }

    /// Lay out the session without attaching.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start), minus the attach step.
    pub fn launch<S: AsRef<str>>(&self, names: &[S]) -> Result<Session, SessionError> {
        let session = self.plan(names)?;
        let name = session.name();

        self.clear_previous(name)?;

        let create_err = |source| SessionError::Create {
            session: name.to_string(),
            source,
        };

        let (first, rest) = session
            .panes()
            .split_first()
            .ok_or(ConfigError::EmptySession)?;

        self.multiplexer.new_session(name, first).map_err(create_err)?;
        info!(session = %name, service = %first.service_name, command = %first.command, "Started pane");
        self.multiplexer.select_tiled_layout(name).map_err(create_err)?;

        // Each split halves the active pane; re-tiling after every split
        // keeps room for the next one.
        for pane in rest {
            self.multiplexer.split_window(name, pane).map_err(create_err)?;
            info!(session = %name, service = %pane.service_name, command = %pane.command, "Started pane");
            self.multiplexer.select_tiled_layout(name).map_err(create_err)?;
        }

        Ok(session)
    }

    /// Whether a session with the configured name exists.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn is_running(&self) -> Result<bool, MultiplexerError> {
        self.multiplexer.has_session(&self.session_name)
    }

    fn clear_previous(&self, name: &str) -> Result<(), SessionError> {
        match self.multiplexer.kill_session(name) {
            Ok(()) => {
                info!(session = %name, "Replaced stale session");
                Ok(())
            }
            Err(MultiplexerError::NoSuchSession(_)) => {
                debug!(session = %name, "No previous session to clear");
                Ok(())
            }
            Err(source) => Err(SessionError::Cleanup {
                session: name.to_string(),
                source,
            }),
        }
    }
}
