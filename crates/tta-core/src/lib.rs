//! tta-core: Core abstractions and configuration for the tta test agent
//!
//! This crate provides the shared types, traits, error types and
//! configuration used by the agent: the `Listener` and `Dialer` seams that
//! let a dialed-out connection be served as if it had been accepted, and the
//! connection-state hook the HTTP server reports lifecycle changes through.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use types::{ConnId, ConnState};
