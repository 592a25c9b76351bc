//! Terminal multiplexer port.

use thiserror::Error;

use crate::domain::PaneProcess;

/// Errors reported by a multiplexer backend.
#[derive(Error, Debug)]
pub enum MultiplexerError {
    /// The named session does not exist. Not a failure when clearing a
    /// stale session before start.
    #[error("no such session '{0}'")]
    NoSuchSession(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} failed: {reason}")]
    Command { action: &'static str, reason: String },
}

/// A terminal multiplexer holding one named session with a single window.
///
/// Calls are synchronous; `attach` blocks until the operator detaches.
pub trait Multiplexer {
    /// Kill the session. Returns [`MultiplexerError::NoSuchSession`] when it
    /// does not exist.
    fn kill_session(&self, session: &str) -> Result<(), MultiplexerError>;

    /// Whether the session exists.
    fn has_session(&self, session: &str) -> Result<bool, MultiplexerError>;

    /// Create a detached session running `pane` in its initial pane.
    fn new_session(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError>;

    /// Split the session's window and run `pane` in the new pane.
    fn split_window(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError>;

    /// Arrange all panes in a tiled layout.
    fn select_tiled_layout(&self, session: &str) -> Result<(), MultiplexerError>;

    /// Attach the operator's terminal to the session.
    fn attach(&self, session: &str) -> Result<(), MultiplexerError>;
}

impl<M: Multiplexer + ?Sized> Multiplexer for &M {
    fn kill_session(&self, session: &str) -> Result<(), MultiplexerError> {
        (**self).kill_session(session)
    }

    fn has_session(&self, session: &str) -> Result<bool, MultiplexerError> {
        (**self).has_session(session)
    }

    fn new_session(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        (**self).new_session(session, pane)
    }

    fn split_window(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        (**self).split_window(session, pane)
    }

    fn select_tiled_layout(&self, session: &str) -> Result<(), MultiplexerError> {
        (**self).select_tiled_layout(session)
    }

    fn attach(&self, session: &str) -> Result<(), MultiplexerError> {
        (**self).attach(session)
    }
}
