//! Outbound TCP dialer to the test driver

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use tta_core::config::AgentConfig;
use tta_core::error::DialError;
use tta_core::traits::Dialer;

/// Dials the driver's fixed `host:port`.
///
/// The name is resolved on every attempt, so a driver that comes up under a
/// new address is picked up by the next retry.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    address: String,
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Create a dialer for `address`
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    /// Create a dialer from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.driver_address.clone(), config.connect_timeout)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&self) -> Result<(TcpStream, SocketAddr), DialError> {
        tracing::trace!("Dialing {}", self.address);
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(self.address.as_str()),
        )
        .await
        .map_err(|_| DialError::Timeout {
            address: self.address.clone(),
            timeout: self.connect_timeout,
        })??;

        let remote = stream.peer_addr()?;
        Ok((stream, remote))
    }

    fn target(&self) -> &str {
        &self.address
    }
}
