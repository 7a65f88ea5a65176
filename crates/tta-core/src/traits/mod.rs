//! Core trait definitions

mod conn_state;
mod dialer;
mod listener;

pub use conn_state::ConnStateHook;
pub use dialer::Dialer;
pub use listener::Listener;
