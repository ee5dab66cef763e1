//! pf ruleset generation and merging.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;

use crate::error::{FirewallError, Result};

/// First line of the managed fragment; its presence in the host
/// ruleset marks the VPN section.
pub const RULE_SENTINEL: &str = "# WireGuard VPN NAT Rules";

/// Last line of the managed fragment.
pub const RULE_SENTINEL_END: &str = "# End WireGuard VPN NAT Rules";

/// Inputs for ruleset generation.
#[derive(Debug, Clone)]
pub struct VpnRuleConfig {
    /// The WireGuard interface (e.g. `wg0`).
    pub interface: String,
    /// The VPN network whose traffic is NATed.
    pub vpn_network: Ipv4Net,
    /// The uplink interface (e.g. `en0`).
    pub external_interface: String,
    /// WireGuard UDP listen port to open on the uplink, when set.
    pub listen_port: Option<u16>,
    /// Outbound TCP ports to allow, when non-empty.
    pub allowed_ports: Vec<u16>,
}

impl VpnRuleConfig {
    /// Creates a config, parsing the VPN network from CIDR notation.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallError::InvalidCidr`] on parse failure.
    pub fn new(
        interface: impl Into<String>,
        vpn_network: &str,
        external_interface: impl Into<String>,
    ) -> Result<Self> {
        let vpn_network = vpn_network.parse().map_err(|e| FirewallError::InvalidCidr {
            message: format!("{vpn_network}: {e}"),
        })?;
        Ok(Self {
            interface: interface.into(),
            vpn_network,
            external_interface: external_interface.into(),
            listen_port: None,
            allowed_ports: Vec::new(),
        })
    }

    /// Sets the UDP listen port to open.
    #[must_use]
    pub const fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Sets the outbound TCP ports to allow.
    #[must_use]
    pub fn with_allowed_ports(mut self, ports: Vec<u16>) -> Self {
        self.allowed_ports = ports;
        self
    }

    /// Validates the config before any host mutation.
    ///
    /// # Errors
    ///
    /// Rejects empty interface names and port 0.
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() || self.external_interface.trim().is_empty() {
            return Err(FirewallError::EmptyInterface);
        }
        if self.listen_port == Some(0) {
            return Err(FirewallError::InvalidPort { port: 0 });
        }
        if self.allowed_ports.contains(&0) {
            return Err(FirewallError::InvalidPort { port: 0 });
        }
        Ok(())
    }
}

/// Generates the pf fragment for a VPN configuration.
///
/// The fragment NATs VPN-sourced traffic out of the uplink, passes
/// traffic in on the WireGuard interface and out on the uplink, and
/// optionally opens the listen port / outbound TCP ports.
///
/// # Errors
///
/// Fails validation before producing any text.
pub fn generate_ruleset(config: &VpnRuleConfig) -> Result<String> {
    config.validate()?;

    let ext = &config.external_interface;
    let mut out = String::new();
    let _ = writeln!(out, "{RULE_SENTINEL}");
    let _ = writeln!(
        out,
        "nat on {ext} from {} to any -> ({ext})",
        config.vpn_network
    );
    let _ = writeln!(out, "pass in on {} all", config.interface);
    let _ = writeln!(out, "pass out on {ext} all");

    if let Some(port) = config.listen_port {
        let _ = writeln!(
            out,
            "pass in on {ext} proto udp from any to any port {port}"
        );
    }

    if !config.allowed_ports.is_empty() {
        let ports: Vec<String> = config.allowed_ports.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "pass out on {ext} proto tcp from any to any port {{ {} }}",
            ports.join(", ")
        );
    }

    let _ = writeln!(out, "{RULE_SENTINEL_END}");
    Ok(out)
}

/// Merges the fragment into an existing host ruleset.
///
/// Any previous VPN section is replaced, so enabling twice produces the
/// same output as enabling once.
#[must_use]
pub fn merge_ruleset(existing: &str, fragment: &str) -> String {
    let mut base = strip_ruleset(existing);
    if !base.is_empty() && !base.ends_with('\n') {
        base.push('\n');
    }
    if !base.is_empty() {
        base.push('\n');
    }
    base.push_str(fragment);
    base
}

/// Removes the VPN section from a host ruleset.
#[must_use]
pub fn strip_ruleset(existing: &str) -> String {
    let mut out = String::new();
    let mut in_section = false;

    for line in existing.lines() {
        if line.trim() == RULE_SENTINEL {
            in_section = true;
            continue;
        }
        if in_section {
            if line.trim() == RULE_SENTINEL_END {
                in_section = false;
            }
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    // Drop trailing blank lines left behind by the removed section.
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Builds the timestamped backup path for a host ruleset.
///
/// The format `<path>.backup.YYYYMMDD_HHMMSS` sorts lexicographically
/// by time.
#[must_use]
pub fn backup_name(path: &Path, at: DateTime<Utc>) -> std::path::PathBuf {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup.{stamp}"));
    std::path::PathBuf::from(name)
}
