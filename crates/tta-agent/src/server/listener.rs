//! Reverse-dial listener
//!
//! Presents connections the supervisor dialed out as if they had been
//! accepted from a listening socket, so the HTTP server cannot tell the
//! difference.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use tta_core::error::ListenerError;
use tta_core::traits::Listener;

/// Address reported by `ChanListener::local_addr`.
///
/// Not a bound socket; it only identifies the reverse channel in logs.
/// 52.0.0.34 spells "TS..DR(iver)".
pub const SENTINEL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(52, 0, 0, 34)), 123);

/// Listener backed by the supervisor's intake channel
pub struct ChanListener<C> {
    intake: mpsc::Receiver<(C, SocketAddr)>,
}

impl<C> ChanListener<C> {
    pub(crate) fn new(intake: mpsc::Receiver<(C, SocketAddr)>) -> Self {
        Self { intake }
    }
}

#[async_trait]
impl<C> Listener for ChanListener<C>
where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Io = C;

    async fn accept(&mut self) -> Result<(C, SocketAddr), ListenerError> {
        self.intake.recv().await.ok_or(ListenerError::Closed)
    }

    fn close(&mut self) -> Result<(), ListenerError> {
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(SENTINEL_ADDR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn remote() -> SocketAddr {
        "10.1.2.3:8008".parse().unwrap()
    }

    #[tokio::test]
    async fn test_accept_yields_queued_connection() {
        let (tx, rx) = mpsc::channel::<(DuplexStream, SocketAddr)>(1);
        let mut listener = ChanListener::new(rx);

        let (conn, _peer) = tokio::io::duplex(16);
        tx.send((conn, remote())).await.unwrap();

        let (_conn, addr) = listener.accept().await.unwrap();
        assert_eq!(addr, remote());
    }

    #[tokio::test]
    async fn test_accept_after_close_of_intake() {
        let (tx, rx) = mpsc::channel::<(DuplexStream, SocketAddr)>(1);
        let mut listener = ChanListener::new(rx);

        let (conn, _peer) = tokio::io::duplex(16);
        tx.send((conn, remote())).await.unwrap();
        drop(tx);

        // Already-queued connections are still delivered.
        assert!(listener.accept().await.is_ok());
        assert!(matches!(listener.accept().await, Err(ListenerError::Closed)));
    }

    #[test]
    fn test_close_is_noop_and_addr_is_sentinel() {
        let (_tx, rx) = mpsc::channel::<(DuplexStream, SocketAddr)>(1);
        let mut listener = ChanListener::new(rx);

        assert!(listener.close().is_ok());
        assert!(listener.close().is_ok());
        assert_eq!(
            listener.local_addr().unwrap(),
            "52.0.0.34:123".parse::<SocketAddr>().unwrap()
        );
    }
}
