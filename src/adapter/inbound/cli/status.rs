//! Dev session status.

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::port::outbound::multiplexer::Multiplexer;

/// Report whether the named session exists.
pub fn execute<M: Multiplexer>(multiplexer: &M, session: &str) -> Result<()> {
    let running = multiplexer.has_session(session)?;
    output::session_status(session, running);
    Ok(())
}
