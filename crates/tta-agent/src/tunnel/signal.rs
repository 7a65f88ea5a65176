//! Need-connection signal
//!
//! A single-slot notification from the lifecycle tracker to the supervisor.
//! At most one signal is ever pending; notifying while one is pending is a
//! no-op, so any number of drain events before the supervisor wakes up
//! coalesce into one dial.

use tokio::sync::mpsc;

/// Create a connected signal pair with nothing pending
pub fn need_conn_channel() -> (NeedConn, NeedConnRx) {
    let (tx, rx) = mpsc::channel(1);
    (NeedConn { tx }, NeedConnRx { rx })
}

/// Sending side: asks the supervisor for a fresh connection
#[derive(Clone, Debug)]
pub struct NeedConn {
    tx: mpsc::Sender<()>,
}

impl NeedConn {
    /// Raise the signal without blocking.
    ///
    /// Returns `false` if a signal was already pending or the supervisor is
    /// gone; neither is an error.
    pub fn notify(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Receiving side, owned by the supervisor
#[derive(Debug)]
pub struct NeedConnRx {
    rx: mpsc::Receiver<()>,
}

impl NeedConnRx {
    /// Wait for the signal. Returns `false` once every sender is dropped.
    pub async fn wait(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Consume a pending signal without waiting
    pub fn take_pending(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
