//! Typed model of a WireGuard configuration file.
//!
//! The file format is INI-like: one `[Interface]` section followed by
//! zero or more `[Peer]` sections. The parser is line-oriented and
//! case-sensitive on section headers; keys it does not recognise are
//! retained in order so a parse/render round trip never loses operator
//! customisations.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::{Result, WireGuardError};
use crate::keys::{PrivateKey, PublicKey};

/// Keepalive interval written into every client config, in seconds.
pub const CLIENT_KEEPALIVE_SECS: u16 = 25;

/// The `[Interface]` section.
#[derive(Debug, Clone)]
pub struct InterfaceSection {
    /// The interface private key.
    pub private_key: PrivateKey,
    /// Interface address in CIDR notation.
    pub address: Option<Ipv4Net>,
    /// UDP listen port.
    pub listen_port: Option<u16>,
    /// DNS servers, in file order.
    pub dns: Vec<String>,
    /// `PostUp` commands, in file order.
    pub post_up: Vec<String>,
    /// `PostDown` commands, in file order.
    pub post_down: Vec<String>,
    /// Unrecognised keys, preserved in file order.
    pub extra: Vec<(String, String)>,
}

impl InterfaceSection {
    /// Creates a minimal interface section.
    #[must_use]
    pub fn new(private_key: PrivateKey) -> Self {
        Self {
            private_key,
            address: None,
            listen_port: None,
            dns: Vec::new(),
            post_up: Vec::new(),
            post_down: Vec::new(),
            extra: Vec::new(),
        }
    }
}

/// A `[Peer]` section.
#[derive(Debug, Clone)]
pub struct PeerSection {
    /// The peer public key.
    pub public_key: PublicKey,
    /// Networks routed to this peer.
    pub allowed_ips: Vec<Ipv4Net>,
    /// Remote endpoint as `host:port`. Hostnames are allowed, so this
    /// stays a string rather than a socket address.
    pub endpoint: Option<String>,
    /// Keepalive interval in seconds.
    pub persistent_keepalive: Option<u16>,
    /// Unrecognised keys, preserved in file order.
    pub extra: Vec<(String, String)>,
}

impl PeerSection {
    /// Creates a minimal peer section.
    #[must_use]
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            allowed_ips: Vec::new(),
            endpoint: None,
            persistent_keepalive: None,
            extra: Vec::new(),
        }
    }

    /// Creates the server-side stanza for a peer: a single /32 route.
    #[must_use]
    pub fn for_client(public_key: PublicKey, address: Ipv4Addr) -> Self {
        let mut peer = Self::new(public_key);
        // /32 is always valid.
        if let Ok(net) = Ipv4Net::new(address, 32) {
            peer.allowed_ips.push(net);
        }
        peer
    }
}

/// A parsed WireGuard configuration file.
#[derive(Debug, Clone)]
pub struct WgConfig {
    /// The `[Interface]` section.
    pub interface: InterfaceSection,
    /// `[Peer]` sections in file order.
    pub peers: Vec<PeerSection>,
}

impl WgConfig {
    /// Creates a config with no peers.
    #[must_use]
    pub fn new(interface: InterfaceSection) -> Self {
        Self {
            interface,
            peers: Vec::new(),
        }
    }

    /// Finds a peer by exact public key.
    #[must_use]
    pub fn find_peer(&self, public_key: &PublicKey) -> Option<&PeerSection> {
        self.peers.iter().find(|p| &p.public_key == public_key)
    }

    /// Removes the peer with the given public key.
    ///
    /// Returns `true` if a peer was removed.
    pub fn remove_peer(&mut self, public_key: &PublicKey) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| &p.public_key != public_key);
        self.peers.len() != before
    }
}

/// Builds a client configuration for one peer.
///
/// The client routes everything through the tunnel (`0.0.0.0/0`) and
/// keeps NAT mappings warm with a 25 second keepalive.
#[must_use]
pub fn client_config(
    private_key: PrivateKey,
    address: Ipv4Addr,
    dns: &[String],
    server_public: PublicKey,
    endpoint: &str,
) -> WgConfig {
    let mut interface = InterfaceSection::new(private_key);
    interface.address = Ipv4Net::new(address, 32).ok();
    interface.dns = dns.to_vec();

    let mut server = PeerSection::new(server_public);
    if let Ok(all) = "0.0.0.0/0".parse() {
        server.allowed_ips.push(all);
    }
    server.endpoint = Some(endpoint.to_string());
    server.persistent_keepalive = Some(CLIENT_KEEPALIVE_SECS);

    let mut config = WgConfig::new(interface);
    config.peers.push(server);
    config
}

/// Renders a configuration to file text. Keys are written as `Key = Value`.
#[must_use]
pub fn render_config(config: &WgConfig) -> String {
    let mut out = String::new();

    out.push_str("[Interface]\n");
    let iface = &config.interface;
    let _ = writeln!(out, "PrivateKey = {}", iface.private_key.to_base64());
    if let Some(address) = iface.address {
        let _ = writeln!(out, "Address = {address}");
    }
    if let Some(port) = iface.listen_port {
        let _ = writeln!(out, "ListenPort = {port}");
    }
    if !iface.dns.is_empty() {
        let _ = writeln!(out, "DNS = {}", iface.dns.join(", "));
    }
    for cmd in &iface.post_up {
        let _ = writeln!(out, "PostUp = {cmd}");
    }
    for cmd in &iface.post_down {
        let _ = writeln!(out, "PostDown = {cmd}");
    }
    for (key, value) in &iface.extra {
        let _ = writeln!(out, "{key} = {value}");
    }

    for peer in &config.peers {
        out.push('\n');
        out.push_str("[Peer]\n");
        let _ = writeln!(out, "PublicKey = {}", peer.public_key.to_base64());
        if !peer.allowed_ips.is_empty() {
            let ips: Vec<String> = peer.allowed_ips.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "AllowedIPs = {}", ips.join(", "));
        }
        if let Some(ref endpoint) = peer.endpoint {
            let _ = writeln!(out, "Endpoint = {endpoint}");
        }
        if let Some(keepalive) = peer.persistent_keepalive {
            let _ = writeln!(out, "PersistentKeepalive = {keepalive}");
        }
        for (key, value) in &peer.extra {
            let _ = writeln!(out, "{key} = {value}");
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
}

#[derive(Default)]
struct PartialInterface {
    private_key: Option<PrivateKey>,
    address: Option<Ipv4Net>,
    listen_port: Option<u16>,
    dns: Vec<String>,
    post_up: Vec<String>,
    post_down: Vec<String>,
    extra: Vec<(String, String)>,
}

impl PartialInterface {
    fn parse_key(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "PrivateKey" => {
                self.private_key =
                    Some(PrivateKey::from_base64(value).map_err(|_| WireGuardError::ParseError {
                        line,
                        message: "invalid PrivateKey".to_string(),
                    })?);
            }
            "Address" => {
                self.address = Some(value.parse().map_err(|_| WireGuardError::ParseError {
                    line,
                    message: format!("invalid Address: {value}"),
                })?);
            }
            "ListenPort" => {
                self.listen_port = Some(value.parse().map_err(|_| WireGuardError::ParseError {
                    line,
                    message: "invalid ListenPort".to_string(),
                })?);
            }
            "DNS" => {
                self.dns
                    .extend(value.split(',').map(|s| s.trim().to_string()));
            }
            "PostUp" => self.post_up.push(value.to_string()),
            "PostDown" => self.post_down.push(value.to_string()),
            _ => self.extra.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn build(self) -> Result<InterfaceSection> {
        let private_key = self.private_key.ok_or_else(|| WireGuardError::ParseError {
            line: 0,
            message: "missing PrivateKey in [Interface] section".to_string(),
        })?;
        Ok(InterfaceSection {
            private_key,
            address: self.address,
            listen_port: self.listen_port,
            dns: self.dns,
            post_up: self.post_up,
            post_down: self.post_down,
            extra: self.extra,
        })
    }
}

#[derive(Default)]
struct PartialPeer {
    public_key: Option<PublicKey>,
    allowed_ips: Vec<Ipv4Net>,
    endpoint: Option<String>,
    persistent_keepalive: Option<u16>,
    extra: Vec<(String, String)>,
}

impl PartialPeer {
    fn parse_key(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "PublicKey" => {
                self.public_key =
                    Some(PublicKey::from_base64(value).map_err(|_| WireGuardError::ParseError {
                        line,
                        message: "invalid PublicKey".to_string(),
                    })?);
            }
            "AllowedIPs" => {
                for ip in value.split(',') {
                    self.allowed_ips.push(ip.trim().parse().map_err(|_| {
                        WireGuardError::ParseError {
                            line,
                            message: format!("invalid AllowedIPs: {ip}"),
                        }
                    })?);
                }
            }
            "Endpoint" => self.endpoint = Some(value.to_string()),
            "PersistentKeepalive" => {
                self.persistent_keepalive =
                    Some(value.parse().map_err(|_| WireGuardError::ParseError {
                        line,
                        message: "invalid PersistentKeepalive".to_string(),
                    })?);
            }
            _ => self.extra.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn build(self, line: usize) -> Result<PeerSection> {
        let public_key = self.public_key.ok_or_else(|| WireGuardError::ParseError {
            line,
            message: "missing PublicKey in [Peer] section".to_string(),
        })?;
        Ok(PeerSection {
            public_key,
            allowed_ips: self.allowed_ips,
            endpoint: self.endpoint,
            persistent_keepalive: self.persistent_keepalive,
            extra: self.extra,
        })
    }
}

/// Parses configuration file text.
///
/// Comments (`#`) and blank lines are skipped. A peer section ends at
/// the next `[...]` header or EOF. Peers come back in file order.
///
/// # Errors
///
/// Returns [`WireGuardError::ParseError`] with the offending line number
/// on malformed input.
pub fn parse_config(text: &str) -> Result<WgConfig> {
    let mut section = Section::None;
    let mut interface = PartialInterface::default();
    let mut seen_interface = false;
    let mut peers: Vec<PeerSection> = Vec::new();
    let mut current_peer: Option<PartialPeer> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some(peer) = current_peer.take() {
                peers.push(peer.build(line)?);
            }

            section = match &trimmed[1..trimmed.len() - 1] {
                "Interface" => {
                    seen_interface = true;
                    Section::Interface
                }
                "Peer" => {
                    current_peer = Some(PartialPeer::default());
                    Section::Peer
                }
                other => {
                    return Err(WireGuardError::ParseError {
                        line,
                        message: format!("unknown section: [{other}]"),
                    });
                }
            };
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(WireGuardError::ParseError {
                line,
                message: format!("expected 'Key = Value', got: {trimmed}"),
            });
        };
        let key = key.trim();
        let value = value.trim();

        match section {
            Section::None => {
                return Err(WireGuardError::ParseError {
                    line,
                    message: "key outside of any section".to_string(),
                });
            }
            Section::Interface => interface.parse_key(key, value, line)?,
            Section::Peer => {
                if let Some(ref mut peer) = current_peer {
                    peer.parse_key(key, value, line)?;
                }
            }
        }
    }

    if let Some(peer) = current_peer {
        peers.push(peer.build(text.lines().count())?);
    }

    if !seen_interface {
        return Err(WireGuardError::ParseError {
            line: 0,
            message: "missing [Interface] section".to_string(),
        });
    }

    Ok(WgConfig {
        interface: interface.build()?,
        peers,
    })
}
