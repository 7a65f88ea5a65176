//! Outbound connection trait

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::DialError;

/// Makes one outbound connection attempt per call.
///
/// Implementations never retry; callers own the retry policy.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Byte stream produced by a successful dial
    type Conn: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Attempt a single connection, returning the stream and its remote address
    async fn dial(&self) -> Result<(Self::Conn, SocketAddr), DialError>;

    /// Human-readable target, for logs
    fn target(&self) -> &str;
}
