//! tta-agent: test agent for virtualized integration tests
//!
//! The agent runs inside a test VM and cannot rely on inbound connections.
//! It dials out to the test driver and serves HTTP over each dialed
//! connection, dialing again whenever the driver has used up the last one.
//! A loopback diagnostics listener serves the same handlers locally.

pub mod handlers;
pub mod logbuf;
pub mod server;
pub mod state;
pub mod tracker;
pub mod tunnel;

pub use state::AgentState;
