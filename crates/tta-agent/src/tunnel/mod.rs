//! Reverse-dial tunnel to the test driver
//!
//! The agent cannot rely on inbound connections, so it dials the driver and
//! serves HTTP over the dialed connection. This module owns the dialing side:
//! the dialer, the supervisor loop, and the signal that asks for a new
//! connection once the current one is spent.

mod dialer;
mod signal;
mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tta_core::config::AgentConfig;
use tta_core::traits::Dialer;

use crate::server::ChanListener;
use crate::tracker::ConnTracker;

pub use dialer::TcpDialer;
pub use signal::{need_conn_channel, NeedConn, NeedConnRx};
pub use supervisor::Supervisor;

/// Capacity of the intake channel between supervisor and listener.
///
/// # Value Choice
///
/// 1 keeps exactly one ready connection in flight: the supervisor cannot
/// start stockpiling connections the driver will never use, and a dial only
/// happens after the previous connection has been picked up.
const INTAKE_CAPACITY: usize = 1;

/// The connected pieces of one reverse-dial channel
pub struct ReverseDial<D: Dialer> {
    /// Dial loop; spawn `supervisor.run(cancel)`
    pub supervisor: Supervisor<D>,
    /// Listener yielding dialed connections to the HTTP server
    pub listener: ChanListener<D::Conn>,
    /// Lifecycle hook to install on the HTTP server
    pub tracker: Arc<ConnTracker>,
    /// Handle for raising the need-connection signal directly
    pub need_conn: NeedConn,
}

impl<D: Dialer> ReverseDial<D> {
    /// Wire a dialer to a listener and tracker.
    ///
    /// One need-connection signal is already pending, so the supervisor's
    /// first dial happens as soon as it runs.
    pub fn new(dialer: D, retry_interval: Duration) -> Self {
        let (need_conn, need_conn_rx) = need_conn_channel();
        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CAPACITY);

        need_conn.notify();

        Self {
            supervisor: Supervisor::new(dialer, need_conn_rx, intake_tx, retry_interval),
            listener: ChanListener::new(intake_rx),
            tracker: Arc::new(ConnTracker::new(need_conn.clone())),
            need_conn,
        }
    }
}

impl ReverseDial<TcpDialer> {
    /// Wire a TCP dialer to the configured driver address
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(TcpDialer::from_config(config), config.retry_interval)
    }
}
