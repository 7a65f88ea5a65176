//! Agent state shared by the HTTP handlers

use tta_core::config::AgentConfig;

use crate::handlers::{Firewall, UnixProxy};
use crate::logbuf::LogBuffer;

/// Host header the local API expects from its clients
const LOCALAPI_HOST: &str = "local-tailscaled.sock";

/// Host header for the gokrazy HTTP endpoint
const GOKRAZY_HOST: &str = "gokrazy";

/// State for the agent's request handlers
pub struct AgentState {
    /// Configuration
    pub config: AgentConfig,
    /// Captured log output served by `/logs`
    pub log_buffer: LogBuffer,
    /// Firewall collaborator for `/fw`
    pub firewall: Firewall,
    /// Proxy to the local control-plane API
    pub localapi: UnixProxy,
    /// Proxy to the gokrazy HTTP endpoint
    pub gokrazy: UnixProxy,
}

impl AgentState {
    /// Create agent state with the platform's firewall support
    pub fn new(config: AgentConfig, log_buffer: LogBuffer) -> Self {
        let firewall = Firewall::for_platform(config.firewall_enabled);
        Self::with_firewall(config, log_buffer, firewall)
    }

    /// Create agent state with an explicit firewall collaborator
    pub fn with_firewall(config: AgentConfig, log_buffer: LogBuffer, firewall: Firewall) -> Self {
        let localapi = UnixProxy::new("localapi", config.localapi_socket.clone(), LOCALAPI_HOST)
            .with_header("sec-tailscale", "localclient");
        let gokrazy = UnixProxy::new("gokrazy", config.gokrazy_socket.clone(), GOKRAZY_HOST);

        Self {
            config,
            log_buffer,
            firewall,
            localapi,
            gokrazy,
        }
    }
}
