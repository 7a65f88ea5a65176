//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Default driver address.
///
/// `test-driver.tailscale` is answered specially by the emulated network's
/// DNS server, so the default only resolves inside the test network.
pub const DEFAULT_DRIVER_ADDRESS: &str = "test-driver.tailscale:8008";

/// Configuration for the test agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Driver address (`host:port`) the agent dials out to
    pub driver_address: String,

    /// Loopback address for the local diagnostics listener
    pub diag_address: String,

    /// Pause between failed dial attempts
    #[serde(rename = "retry_interval_ms", with = "duration_millis")]
    pub retry_interval: Duration,

    /// Upper bound on a single dial attempt
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Command run by `/up`: program followed by its arguments
    pub up_command: Vec<String>,

    /// Unix socket of the local control-plane API
    pub localapi_socket: PathBuf,

    /// Unix socket of the gokrazy HTTP endpoint
    pub gokrazy_socket: PathBuf,

    /// Whether `/fw` may install firewall rules on supported platforms
    pub firewall_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            driver_address: DEFAULT_DRIVER_ADDRESS.to_string(),
            diag_address: "127.0.0.1:8123".to_string(),
            retry_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            up_command: vec![
                "tailscale".to_string(),
                "up".to_string(),
                "--login-server=http://control.tailscale".to_string(),
            ],
            localapi_socket: PathBuf::from("/var/run/tailscale/tailscaled.sock"),
            gokrazy_socket: PathBuf::from("/run/gokrazy-http.sock"),
            firewall_enabled: true,
        }
    }
}

impl AgentConfig {
    /// Split `up_command` into program and arguments.
    ///
    /// Returns `None` when the command is empty.
    pub fn up_program(&self) -> Option<(&str, &[String])> {
        let (program, args) = self.up_command.split_first()?;
        Some((program.as_str(), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.driver_address, "test-driver.tailscale:8008");
        assert_eq!(config.diag_address, "127.0.0.1:8123");
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert!(config.firewall_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
driver_address = "10.0.0.2:8008"
retry_interval_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.driver_address, "10.0.0.2:8008");
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.gokrazy_socket, PathBuf::from("/run/gokrazy-http.sock"));
    }

    #[test]
    fn test_up_program() {
        let config = AgentConfig::default();
        let (program, args) = config.up_program().unwrap();
        assert_eq!(program, "tailscale");
        assert_eq!(args, ["up", "--login-server=http://control.tailscale"]);

        let empty = AgentConfig {
            up_command: vec![],
            ..AgentConfig::default()
        };
        assert!(empty.up_program().is_none());
    }
}
