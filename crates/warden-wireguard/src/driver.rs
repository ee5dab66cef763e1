//! On-host WireGuard interface driver.
//!
//! The on-disk config file is the single source of truth. Peer
//! mutations parse the file into the typed model, edit it, and rewrite
//! atomically (tempfile in the same directory, mode 0600, rename).
//! Callers must serialise concurrent mutations.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{parse_config, render_config, PeerSection, WgConfig};
use crate::error::{Result, WireGuardError};
use crate::keys::PublicKey;

/// Pause between stop and start during a restart.
const RESTART_PAUSE: Duration = Duration::from_millis(500);

/// Stderr fragments from `wg-quick down` that mean the interface was
/// already gone, which we treat as a successful stop.
const ALREADY_DOWN_MARKERS: &[&str] = &["No such device", "is not a WireGuard interface"];

/// Interface run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceState {
    /// The interface is up and answering `wg show`.
    Running,
    /// The interface does not exist.
    Stopped,
    /// `wg show` failed for a reason other than a missing device.
    Error,
}

impl InterfaceState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

/// A point-in-time snapshot of the interface.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceStatus {
    /// Run state.
    pub state: InterfaceState,
    /// Interface name.
    pub interface: String,
    /// When the sample was taken.
    pub checked_at: DateTime<Utc>,
    /// Number of peers configured on the live interface.
    pub peer_count: usize,
    /// Error detail when `state` is [`InterfaceState::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Live peer state parsed from `wg show <iface> dump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePeer {
    /// The peer public key.
    pub public_key: PublicKey,
    /// Current remote endpoint, when known.
    pub endpoint: Option<String>,
    /// Most recent handshake; `None` if the peer never connected.
    pub latest_handshake: Option<DateTime<Utc>>,
    /// Bytes received from the peer.
    pub bytes_received: u64,
    /// Bytes sent to the peer.
    pub bytes_sent: u64,
}

/// Driver for one WireGuard interface.
#[derive(Debug, Clone)]
pub struct WgDriver {
    config_dir: PathBuf,
    interface: String,
}

impl WgDriver {
    /// Creates a driver for `<config_dir>/<interface>.conf`.
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>, interface: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            interface: interface.into(),
        }
    }

    /// Returns the interface name.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Returns the path of the interface config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    /// Writes the full configuration file.
    ///
    /// The parent directory is created when missing; the file lands at
    /// mode 0600 via an atomic tempfile-and-rename so a crash never
    /// leaves a half-written config behind.
    ///
    /// # Errors
    ///
    /// Surfaces IO failures (permissions, disk).
    pub fn write_config(&self, config: &WgConfig) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let path = self.config_path();
        write_atomic_0600(&self.config_dir, &path, &render_config(config))?;
        info!(path = %path.display(), peers = config.peers.len(), "wrote interface config");
        Ok(())
    }

    /// Brings the interface up with `wg-quick up`.
    ///
    /// # Errors
    ///
    /// Fails when the config file is missing, the tool is absent, or
    /// `wg-quick` exits non-zero (the tool's stderr is surfaced).
    pub async fn start(&self) -> Result<()> {
        let path = self.config_path();
        if !path.exists() {
            return Err(WireGuardError::ConfigMissing(path));
        }

        run_tool("wg-quick", &["up", &path.to_string_lossy()]).await?;
        info!(interface = %self.interface, "interface started");
        Ok(())
    }

    /// Takes the interface down with `wg-quick down`.
    ///
    /// Stopping an interface that is already gone is a successful no-op.
    ///
    /// # Errors
    ///
    /// Fails when the tool is absent or exits non-zero for any other
    /// reason.
    pub async fn stop(&self) -> Result<()> {
        let path = self.config_path();
        match run_tool("wg-quick", &["down", &path.to_string_lossy()]).await {
            Ok(()) => {
                info!(interface = %self.interface, "interface stopped");
                Ok(())
            }
            Err(WireGuardError::CommandFailed { ref stderr, .. })
                if ALREADY_DOWN_MARKERS.iter().any(|m| stderr.contains(m)) =>
            {
                debug!(interface = %self.interface, "interface already down");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Restarts the interface: stop (errors ignored), brief pause, start.
    ///
    /// # Errors
    ///
    /// Propagates failures from the start step only.
    pub async fn restart(&self) -> Result<()> {
        if let Err(e) = self.stop().await {
            warn!(interface = %self.interface, error = %e, "stop during restart failed");
        }
        tokio::time::sleep(RESTART_PAUSE).await;
        self.start().await
    }

    /// Samples the interface state via `wg show <iface>`.
    ///
    /// A missing device maps to [`InterfaceState::Stopped`]; any other
    /// tool failure maps to [`InterfaceState::Error`] with the message
    /// preserved.
    ///
    /// # Errors
    ///
    /// Fails only when the `wg` tool itself is not installed.
    pub async fn status(&self) -> Result<InterfaceStatus> {
        let checked_at = Utc::now();
        match run_tool_capture("wg", &["show", &self.interface]).await {
            Ok(stdout) => Ok(InterfaceStatus {
                state: InterfaceState::Running,
                interface: self.interface.clone(),
                checked_at,
                peer_count: parse_show_peer_count(&stdout),
                message: None,
            }),
            Err(WireGuardError::CommandFailed { ref stderr, .. })
                if stderr.contains("No such device") =>
            {
                Ok(InterfaceStatus {
                    state: InterfaceState::Stopped,
                    interface: self.interface.clone(),
                    checked_at,
                    peer_count: 0,
                    message: None,
                })
            }
            Err(WireGuardError::CommandFailed { stderr, .. }) => Ok(InterfaceStatus {
                state: InterfaceState::Error,
                interface: self.interface.clone(),
                checked_at,
                peer_count: 0,
                message: Some(stderr),
            }),
            Err(e) => Err(e),
        }
    }

    /// Reads live peer statistics via `wg show <iface> dump`.
    ///
    /// # Errors
    ///
    /// Fails when the tool is absent or the interface is down.
    pub async fn runtime_peers(&self) -> Result<Vec<RuntimePeer>> {
        let stdout = run_tool_capture("wg", &["show", &self.interface, "dump"]).await?;
        parse_dump(&stdout)
    }

    /// Appends a peer stanza to the config file.
    ///
    /// # Errors
    ///
    /// Fails when the config file is missing or unreadable.
    pub fn add_peer(&self, peer: PeerSection) -> Result<()> {
        let mut config = self.get_config()?;
        let public_key = peer.public_key;
        config.peers.push(peer);
        self.rewrite(&config)?;
        info!(interface = %self.interface, peer = %public_key, "peer added to config");
        Ok(())
    }

    /// Removes the peer whose `PublicKey` matches exactly.
    ///
    /// Returns `true` when a stanza was removed; an absent peer is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails when the config file is missing or unreadable.
    pub fn remove_peer(&self, public_key: &PublicKey) -> Result<bool> {
        let mut config = self.get_config()?;
        let removed = config.remove_peer(public_key);
        if removed {
            self.rewrite(&config)?;
            info!(interface = %self.interface, peer = %public_key, "peer removed from config");
        } else {
            debug!(interface = %self.interface, peer = %public_key, "peer not in config");
        }
        Ok(removed)
    }

    /// Parses and returns the current config file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or malformed.
    pub fn get_config(&self) -> Result<WgConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Err(WireGuardError::ConfigMissing(path));
        }
        let text = std::fs::read_to_string(&path)?;
        parse_config(&text)
    }

    /// Returns the configured peers in file order.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or malformed.
    pub fn get_peers(&self) -> Result<Vec<PeerSection>> {
        Ok(self.get_config()?.peers)
    }

    fn rewrite(&self, config: &WgConfig) -> Result<()> {
        write_atomic_0600(&self.config_dir, &self.config_path(), &render_config(config))
    }
}

/// Writes `contents` to `path` atomically at mode 0600.
fn write_atomic_0600(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tmp.as_file().set_permissions(perms)?;
    }

    tmp.persist(path).map_err(|e| WireGuardError::Io(e.error))?;
    Ok(())
}

/// Runs a tool, discarding stdout.
async fn run_tool(tool: &str, args: &[&str]) -> Result<()> {
    run_tool_capture(tool, args).await.map(|_| ())
}

/// Runs a tool and captures stdout.
async fn run_tool_capture(tool: &str, args: &[&str]) -> Result<String> {
    debug!(tool, ?args, "invoking");
    let output = Command::new(tool).args(args).output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WireGuardError::ToolMissing {
                tool: tool.to_string(),
            }
        } else {
            WireGuardError::Io(e)
        }
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(WireGuardError::CommandFailed {
            tool: tool.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Counts peers in human-readable `wg show` output.
fn parse_show_peer_count(stdout: &str) -> usize {
    stdout
        .lines()
        .filter(|line| line.trim_start().starts_with("peer:"))
        .count()
}

/// Parses `wg show <iface> dump` output.
///
/// The first line describes the interface; each following line is one
/// peer: `public-key psk endpoint allowed-ips latest-handshake rx tx
/// keepalive`, tab-separated. A handshake of `0` means never.
fn parse_dump(stdout: &str) -> Result<Vec<RuntimePeer>> {
    let mut peers = Vec::new();

    for line in stdout.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }

        let public_key = PublicKey::from_base64(fields[0])?;
        let endpoint = match fields[2] {
            "(none)" => None,
            other => Some(other.to_string()),
        };
        let handshake_secs: i64 = fields[4].parse().unwrap_or(0);
        let latest_handshake = if handshake_secs > 0 {
            DateTime::from_timestamp(handshake_secs, 0)
        } else {
            None
        };
        let bytes_received = fields[5].parse().unwrap_or(0);
        let bytes_sent = fields[6].parse().unwrap_or(0);

        peers.push(RuntimePeer {
            public_key,
            endpoint,
            latest_handshake,
            bytes_received,
            bytes_sent,
        });
    }

    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterfaceSection, WgConfig};
    use crate::keys::{KeyPair, PrivateKey};

    fn test_config() -> WgConfig {
        let mut iface = InterfaceSection::new(PrivateKey::from_bytes([5u8; 32]));
        iface.address = Some("10.8.0.1/24".parse().unwrap());
        iface.listen_port = Some(51820);
        WgConfig::new(iface)
    }

    fn driver_in(dir: &Path) -> WgDriver {
        WgDriver::new(dir, "wg0")
    }

    mod config_file_tests {
        use super::*;

        #[test]
        fn config_path_joins_dir_and_iface() {
            let driver = WgDriver::new("/etc/wireguard", "wg0");
            assert_eq!(
                driver.config_path(),
                PathBuf::from("/etc/wireguard/wg0.conf")
            );
        }

        #[test]
        fn write_then_read_roundtrip() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            let config = test_config();

            driver.write_config(&config).expect("should write");
            let read = driver.get_config().expect("should read");

            assert_eq!(read.interface.private_key, config.interface.private_key);
            assert_eq!(read.interface.listen_port, Some(51820));
            assert_eq!(
                read.interface.address,
                Some("10.8.0.1/24".parse().unwrap())
            );
        }

        #[cfg(unix)]
        #[test]
        fn config_file_is_mode_0600() {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            driver.write_config(&test_config()).expect("should write");

            let mode = std::fs::metadata(driver.config_path())
                .expect("metadata")
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        #[test]
        fn write_creates_missing_directory() {
            let dir = tempfile::tempdir().expect("tempdir");
            let nested = dir.path().join("wireguard");
            let driver = driver_in(&nested);

            driver.write_config(&test_config()).expect("should write");
            assert!(driver.config_path().exists());
        }

        #[test]
        fn get_config_without_file_fails() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            let result = driver.get_config();
            assert!(matches!(result, Err(WireGuardError::ConfigMissing(_))));
        }
    }

    mod peer_mutation_tests {
        use super::*;

        #[test]
        fn add_peer_appears_exactly_once() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            driver.write_config(&test_config()).expect("should write");

            let pair = KeyPair::generate();
            let peer = PeerSection::for_client(*pair.public_key(), "10.8.0.2".parse().unwrap());
            driver.add_peer(peer).expect("should add");

            let peers = driver.get_peers().expect("should read");
            let matching = peers
                .iter()
                .filter(|p| &p.public_key == pair.public_key())
                .count();
            assert_eq!(matching, 1);
        }

        #[test]
        fn remove_peer_deletes_stanza() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            driver.write_config(&test_config()).expect("should write");

            let pair = KeyPair::generate();
            let peer = PeerSection::for_client(*pair.public_key(), "10.8.0.2".parse().unwrap());
            driver.add_peer(peer).expect("should add");

            let removed = driver.remove_peer(pair.public_key()).expect("should remove");
            assert!(removed);

            let peers = driver.get_peers().expect("should read");
            assert!(peers.iter().all(|p| &p.public_key != pair.public_key()));
        }

        #[test]
        fn remove_absent_peer_is_noop() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            driver.write_config(&test_config()).expect("should write");

            let stranger = KeyPair::generate();
            let removed = driver
                .remove_peer(stranger.public_key())
                .expect("should succeed");
            assert!(!removed);
        }

        #[test]
        fn mutations_preserve_interface_section() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());

            let mut config = test_config();
            config.interface.post_up.push("echo up".to_string());
            driver.write_config(&config).expect("should write");

            let pair = KeyPair::generate();
            driver
                .add_peer(PeerSection::for_client(
                    *pair.public_key(),
                    "10.8.0.2".parse().unwrap(),
                ))
                .expect("should add");
            driver.remove_peer(pair.public_key()).expect("should remove");

            let read = driver.get_config().expect("should read");
            assert_eq!(read.interface.post_up, vec!["echo up".to_string()]);
            assert_eq!(read.interface.listen_port, Some(51820));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn start_without_config_fails() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            let result = driver.start().await;
            assert!(matches!(result, Err(WireGuardError::ConfigMissing(_))));
        }

        // The remaining lifecycle paths shell out to wg/wg-quick and
        // need the tools plus elevated privileges, so they stay out of
        // the default unit run.

        #[tokio::test]
        #[ignore = "requires wireguard-tools and root"]
        async fn start_stop_cycle() {
            let dir = tempfile::tempdir().expect("tempdir");
            let driver = driver_in(dir.path());
            driver.write_config(&test_config()).expect("should write");
            driver.start().await.expect("should start");
            driver.stop().await.expect("should stop");
        }

        #[tokio::test]
        #[ignore = "requires wireguard-tools"]
        async fn status_reports_stopped_for_missing_device() {
            let driver = WgDriver::new("/tmp", "wg-warden-test-missing");
            let status = driver.status().await.expect("wg installed");
            assert_eq!(status.state, InterfaceState::Stopped);
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn counts_peers_in_show_output() {
            let output = "interface: wg0\n  public key: abc\n  listening port: 51820\n\n\
                          peer: k1\n  endpoint: 1.2.3.4:5\n\npeer: k2\n  allowed ips: 10.8.0.3/32\n";
            assert_eq!(parse_show_peer_count(output), 2);
        }

        #[test]
        fn counts_zero_peers() {
            let output = "interface: wg0\n  public key: abc\n  listening port: 51820\n";
            assert_eq!(parse_show_peer_count(output), 0);
        }

        #[test]
        fn parses_dump_lines() {
            let a = KeyPair::generate();
            let b = KeyPair::generate();
            let dump = format!(
                "privkey\tpubkey\t51820\toff\n\
                 {}\t(none)\t203.0.113.4:51820\t10.8.0.2/32\t1700000000\t1024\t2048\t25\n\
                 {}\t(none)\t(none)\t10.8.0.3/32\t0\t0\t0\toff\n",
                a.public_key().to_base64(),
                b.public_key().to_base64()
            );

            let peers = parse_dump(&dump).expect("should parse");
            assert_eq!(peers.len(), 2);

            assert_eq!(peers[0].public_key, *a.public_key());
            assert_eq!(peers[0].endpoint.as_deref(), Some("203.0.113.4:51820"));
            assert!(peers[0].latest_handshake.is_some());
            assert_eq!(peers[0].bytes_received, 1024);
            assert_eq!(peers[0].bytes_sent, 2048);

            assert!(peers[1].endpoint.is_none());
            assert!(peers[1].latest_handshake.is_none());
        }

        #[test]
        fn dump_with_no_peers_is_empty() {
            let peers = parse_dump("privkey\tpubkey\t51820\toff\n").expect("should parse");
            assert!(peers.is_empty());
        }

        #[test]
        fn interface_state_strings() {
            assert_eq!(InterfaceState::Running.as_str(), "running");
            assert_eq!(InterfaceState::Stopped.as_str(), "stopped");
            assert_eq!(InterfaceState::Error.as_str(), "error");
        }
    }
}
