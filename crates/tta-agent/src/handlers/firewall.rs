//! Host firewall setup for `/fw`
//!
//! Firewall support is platform-dependent. Callers see it as an explicit
//! capability: either a backend that can install rules, or `Unsupported`.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Something that can install the agent's firewall rules
#[async_trait]
pub trait FirewallBackend: Send + Sync {
    /// Install the rules, replacing any previously installed by this backend
    async fn apply(&self) -> Result<()>;
}

/// Firewall capability of this host
#[derive(Clone)]
pub enum Firewall {
    /// No firewall support on this platform (or disabled by config)
    Unsupported,
    /// Rules can be installed through this backend
    Supported(Arc<dyn FirewallBackend>),
}

impl Firewall {
    /// Firewall support for the current platform.
    ///
    /// `enabled = false` forces `Unsupported`.
    pub fn for_platform(enabled: bool) -> Self {
        if !enabled {
            return Firewall::Unsupported;
        }
        Self::platform_default()
    }

    #[cfg(target_os = "linux")]
    fn platform_default() -> Self {
        Firewall::Supported(Arc::new(Nftables::default()))
    }

    #[cfg(not(target_os = "linux"))]
    fn platform_default() -> Self {
        Firewall::Unsupported
    }

    /// Whether rules can be installed
    pub fn is_supported(&self) -> bool {
        matches!(self, Firewall::Supported(_))
    }
}

/// nftables backend driven through the `nft` CLI.
///
/// Installs one table with an input chain that drops unsolicited inbound
/// traffic:
/// ```text
/// table inet tta {
///     chain input {
///         type filter hook input priority filter; policy drop;
///         ...
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Nftables {
    table: String,
}

impl Default for Nftables {
    fn default() -> Self {
        Self {
            table: "tta".to_string(),
        }
    }
}

impl Nftables {
    /// Ruleset fed to `nft -f -`
    pub fn ruleset(&self) -> String {
        format!(
            r#"
table inet {table} {{
    chain input {{
        type filter hook input priority filter; policy drop;

        iifname "lo" accept
        ct state established,related accept

        # The driver's HTTP connections may predate these rules and so are
        # not tracked as established; let their non-SYN segments through.
        tcp flags & syn == 0x0 accept
    }}
}}
"#,
            table = self.table,
        )
    }
}

#[async_trait]
impl FirewallBackend for Nftables {
    async fn apply(&self) -> Result<()> {
        tracing::info!("Installing nftables rules in table inet {}", self.table);

        // Fails when the table doesn't exist yet, which is fine.
        if let Err(e) = nft(&["delete", "table", "inet", &self.table], None).await {
            tracing::debug!("No previous table to remove: {:#}", e);
        }

        nft(&["-f", "-"], Some(&self.ruleset()))
            .await
            .context("failed to install nftables ruleset")?;

        tracing::info!("nftables rules installed");
        Ok(())
    }
}

/// Run `nft` with `args`, feeding `script` on stdin when given
async fn nft(args: &[&str], script: Option<&str>) -> Result<()> {
    run_tool("nft", args, script).await
}

/// Run `program`, failing with its stderr when it exits unsuccessfully
async fn run_tool(program: &str, args: &[&str], script: Option<&str>) -> Result<()> {
    tracing::debug!(program, ?args, script_len = script.map(str::len), "running tool");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if script.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;

    if let (Some(script), Some(mut stdin)) = (script, child.stdin.take()) {
        stdin
            .write_all(script.as_bytes())
            .await
            .with_context(|| format!("failed to write script to {}", program))?;
        // Dropping stdin signals end of input.
    }

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("{} did not finish", program))?;
    if !output.status.success() {
        bail!(
            "{} {}: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_unsupported() {
        assert!(!Firewall::for_platform(false).is_supported());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_default_is_supported() {
        assert!(Firewall::for_platform(true).is_supported());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_other_platforms_unsupported() {
        assert!(!Firewall::for_platform(true).is_supported());
    }

    #[test]
    fn test_ruleset_drops_unsolicited_input() {
        let ruleset = Nftables::default().ruleset();
        assert!(ruleset.contains("table inet tta {"));
        assert!(ruleset.contains("type filter hook input priority filter; policy drop;"));
        assert!(ruleset.contains("iifname \"lo\" accept"));
        assert!(ruleset.contains("ct state established,related accept"));
        assert!(ruleset.contains("tcp flags & syn == 0x0 accept"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_feeds_script_on_stdin() {
        let check = r#"read line; [ "$line" = "table inet tta" ]"#;
        run_tool("sh", &["-c", check], Some("table inet tta\n"))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_without_script_gets_empty_stdin() {
        run_tool("sh", &["-c", "! read line"], None).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_failure_carries_stderr() {
        let err = run_tool("sh", &["-c", "echo 'no such table' >&2; exit 1"], None)
            .await
            .unwrap_err();
        assert_eq!(format!("{:#}", err), "sh -c echo 'no such table' >&2; exit 1: no such table");
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let err = run_tool("/nonexistent/tta-nft", &[], None).await.unwrap_err();
        assert!(format!("{:#}", err).starts_with("failed to spawn /nonexistent/tta-nft"));
    }
}
