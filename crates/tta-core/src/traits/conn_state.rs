//! Connection state callback

use crate::types::{ConnId, ConnState};

/// Receives every lifecycle transition of every connection a server handles.
///
/// Called synchronously from the server's own tasks, so implementations must
/// not block: take a short lock at most, never perform I/O.
pub trait ConnStateHook: Send + Sync + 'static {
    /// Record that `conn` moved to `state`
    fn on_state(&self, conn: ConnId, state: ConnState);
}
