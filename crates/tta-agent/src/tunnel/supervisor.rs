//! Reconnection supervisor
//!
//! Waits for the need-connection signal, dials the driver, and hands the new
//! connection to the reverse-dial listener. Dial failures are retried at a
//! fixed interval for as long as the process runs.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tta_core::traits::Dialer;

use super::signal::NeedConnRx;

/// Remembers the last reported dial failure so an outage is logged once
/// rather than once per retry. Successful dials leave it untouched.
#[derive(Debug, Default)]
pub(crate) struct FailureLog {
    last: Option<String>,
}

impl FailureLog {
    /// Record a failure; returns `true` if it should be logged
    pub(crate) fn record(&mut self, message: &str) -> bool {
        if self.last.as_deref() == Some(message) {
            return false;
        }
        self.last = Some(message.to_owned());
        true
    }
}

/// Drives the dial loop for one reverse-dial listener
pub struct Supervisor<D: Dialer> {
    dialer: D,
    need_conn: NeedConnRx,
    intake: mpsc::Sender<(D::Conn, SocketAddr)>,
    retry_interval: Duration,
    failures: FailureLog,
}

impl<D: Dialer> Supervisor<D> {
    pub(crate) fn new(
        dialer: D,
        need_conn: NeedConnRx,
        intake: mpsc::Sender<(D::Conn, SocketAddr)>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            dialer,
            need_conn,
            intake,
            retry_interval,
            failures: FailureLog::default(),
        }
    }

    /// Run until cancelled.
    ///
    /// Also returns if the listener or every signal sender is gone. Returning
    /// drops the intake sender, which closes the listener.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Reconnection supervisor dialing {}", self.dialer.target());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signaled = self.need_conn.wait() => {
                    if !signaled {
                        tracing::debug!("Need-connection signal closed");
                        break;
                    }
                }
            }

            let Some((conn, remote)) = self.connect(&cancel).await else {
                break;
            };
            tracing::debug!("Connected to driver at {}", remote);

            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = self.intake.send((conn, remote)) => {
                    if sent.is_err() {
                        tracing::warn!("Reverse-dial listener is gone, stopping supervisor");
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconnection supervisor stopped");
    }

    /// Dial until an attempt succeeds. Returns `None` if cancelled first.
    async fn connect(&mut self, cancel: &CancellationToken) -> Option<(D::Conn, SocketAddr)> {
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = self.dialer.dial() => result,
            };

            match result {
                Ok(dialed) => return Some(dialed),
                Err(e) => {
                    let message = e.to_string();
                    if self.failures.record(&message) {
                        tracing::warn!("Connect failure: {}", message);
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }
}
