//! Core types shared between the server and the lifecycle tracker

use std::fmt;

/// Identifier the HTTP server assigns to each connection it accepts.
///
/// Ids are unique for the lifetime of one server and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle phase of a served connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Accepted, no request read yet
    New,
    /// A request has been read and is being handled
    Active,
    /// Between requests on a keep-alive connection
    Idle,
    /// The server is done with the connection
    Closed,
}

impl ConnState {
    /// Get the state name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::New => "new",
            ConnState::Active => "active",
            ConnState::Idle => "idle",
            ConnState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
