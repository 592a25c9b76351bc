//! In-memory multiplexer that records calls.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::domain::PaneProcess;
use crate::port::outbound::multiplexer::{Multiplexer, MultiplexerError};

/// A call made against [`RecordingMultiplexer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Kill(String),
    NewSession(String, String),
    Split(String, String),
    Tile(String),
    Attach(String),
}

/// Splits a detached 80x24 window takes before tmux reports
/// "no space for new pane", unless the layout is re-tiled in between.
pub const UNTILED_SPLIT_ROOM: usize = 3;

#[derive(Debug, Default)]
struct SessionState {
    panes: Vec<String>,
    tiled: bool,
    untiled_splits: usize,
}

#[derive(Debug, Default)]
struct State {
    sessions: BTreeMap<String, SessionState>,
    calls: Vec<Call>,
}

/// Multiplexer fake with a real session table.
///
/// Sessions persist across calls (and across supervisors sharing the fake by
/// reference), so restart behaviour can be observed.
#[derive(Debug, Default)]
pub struct RecordingMultiplexer {
    state: Mutex<State>,
    kill_failure: Option<String>,
    split_failure: Option<String>,
}

impl RecordingMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kill_session` fail with a non-"absent" error.
    #[must_use]
    pub fn fail_kill_with(mut self, reason: impl Into<String>) -> Self {
        self.kill_failure = Some(reason.into());
        self
    }

    /// Make `split_window` fail.
    #[must_use]
    pub fn fail_split_with(mut self, reason: impl Into<String>) -> Self {
        self.split_failure = Some(reason.into());
        self
    }

    /// Pre-populate a session, as if left over from an earlier run.
    #[must_use]
    pub fn with_session(self, name: &str, panes: &[&str]) -> Self {
        self.state.lock().sessions.insert(
            name.to_string(),
            SessionState {
                panes: panes.iter().map(|p| (*p).to_string()).collect(),
                ..SessionState::default()
            },
        );
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of live sessions with this name (0 or 1).
    #[must_use]
    pub fn session_count(&self, name: &str) -> usize {
        usize::from(self.state.lock().sessions.contains_key(name))
    }

    /// Services in pane order for a live session.
    #[must_use]
    pub fn panes(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .sessions
            .get(name)
            .map(|s| s.panes.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_tiled(&self, name: &str) -> bool {
        self.state
            .lock()
            .sessions
            .get(name)
            .is_some_and(|s| s.tiled)
    }
}

impl Multiplexer for RecordingMultiplexer {
    fn kill_session(&self, session: &str) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Kill(session.to_string()));
        if let Some(reason) = &self.kill_failure {
            return Err(MultiplexerError::Command {
                action: "kill-session",
                reason: reason.clone(),
            });
        }
        state
            .sessions
            .remove(session)
            .map(|_| ())
            .ok_or_else(|| MultiplexerError::NoSuchSession(session.to_string()))
    }

    fn has_session(&self, session: &str) -> Result<bool, MultiplexerError> {
        Ok(self.state.lock().sessions.contains_key(session))
    }

    fn new_session(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::NewSession(session.to_string(), pane.service_name.clone()));
        if state.sessions.contains_key(session) {
            return Err(MultiplexerError::Command {
                action: "new-session",
                reason: format!("duplicate session: {session}"),
            });
        }
        state.sessions.insert(
            session.to_string(),
            SessionState {
                panes: vec![pane.service_name.clone()],
                ..SessionState::default()
            },
        );
        Ok(())
    }

    fn split_window(&self, session: &str, pane: &PaneProcess) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::Split(session.to_string(), pane.service_name.clone()));
        if let Some(reason) = &self.split_failure {
            return Err(MultiplexerError::Command {
                action: "split-window",
                reason: reason.clone(),
            });
        }
        let entry = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| MultiplexerError::NoSuchSession(session.to_string()))?;
        if entry.untiled_splits >= UNTILED_SPLIT_ROOM {
            return Err(MultiplexerError::Command {
                action: "split-window",
                reason: "no space for new pane".into(),
            });
        }
        entry.panes.push(pane.service_name.clone());
        entry.untiled_splits += 1;
        entry.tiled = false;
        Ok(())
    }

    fn select_tiled_layout(&self, session: &str) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Tile(session.to_string()));
        let entry = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| MultiplexerError::NoSuchSession(session.to_string()))?;
        entry.tiled = true;
        entry.untiled_splits = 0;
        Ok(())
    }

    fn attach(&self, session: &str) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Attach(session.to_string()));
        if state.sessions.contains_key(session) {
            Ok(())
        } else {
            Err(MultiplexerError::NoSuchSession(session.to_string()))
        }
    }
}
