//! Listener trait
//!
//! The accept contract the HTTP server is written against. A bound TCP
//! socket satisfies it, and so does a channel of connections that were
//! dialed out rather than accepted in.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::error::ListenerError;

/// Source of connections for a server
#[async_trait]
pub trait Listener: Send + 'static {
    /// Byte stream type of accepted connections
    type Io: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next connection.
    ///
    /// `ListenerError::Closed` means no connection will ever arrive again.
    async fn accept(&mut self) -> Result<(Self::Io, SocketAddr), ListenerError>;

    /// Release the listener's resources
    fn close(&mut self) -> Result<(), ListenerError>;

    /// Address the listener is identified by
    fn local_addr(&self) -> Result<SocketAddr, ListenerError>;
}

#[async_trait]
impl Listener for TcpListener {
    type Io = tokio::net::TcpStream;

    async fn accept(&mut self) -> Result<(Self::Io, SocketAddr), ListenerError> {
        Ok(TcpListener::accept(self).await?)
    }

    fn close(&mut self) -> Result<(), ListenerError> {
        // The socket is released when the listener is dropped.
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(TcpListener::local_addr(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_listener_accepts() {
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = Listener::local_addr(&listener).unwrap();

        let client = tokio::spawn(async move { tokio::net::TcpStream::connect(addr).await });

        let (_stream, peer) = Listener::accept(&mut listener).await.unwrap();
        let client = client.await.unwrap().unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
        assert!(Listener::close(&mut listener).is_ok());
    }
}
