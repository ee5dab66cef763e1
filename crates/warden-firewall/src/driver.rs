//! pfctl driver: installation, backup, and rollback of the host ruleset.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{FirewallError, Result};
use crate::rules::{backup_name, generate_ruleset, merge_ruleset, strip_ruleset, VpnRuleConfig};

/// Current firewall state.
#[derive(Debug, Clone, Serialize)]
pub struct FirewallStatus {
    /// Whether the packet filter is enabled.
    pub enabled: bool,
    /// Number of rules currently loaded.
    pub rule_count: usize,
}

/// Driver for the host pf firewall.
///
/// Every mutating call requires elevated privileges; denials surface as
/// [`FirewallError::PermissionDenied`] rather than a panic.
#[derive(Debug, Clone)]
pub struct PfDriver {
    ruleset_path: PathBuf,
    anchor_path: PathBuf,
}

impl Default for PfDriver {
    fn default() -> Self {
        Self::new("/etc/pf.conf", "/etc/pf.anchors/warden-vpn")
    }
}

impl PfDriver {
    /// Creates a driver over the given host ruleset and anchor paths.
    #[must_use]
    pub fn new(ruleset_path: impl Into<PathBuf>, anchor_path: impl Into<PathBuf>) -> Self {
        Self {
            ruleset_path: ruleset_path.into(),
            anchor_path: anchor_path.into(),
        }
    }

    /// Returns the host ruleset path.
    #[must_use]
    pub fn ruleset_path(&self) -> &Path {
        &self.ruleset_path
    }

    /// Installs the VPN ruleset.
    ///
    /// Writes the generated fragment to the anchor file, backs up the
    /// host ruleset, merges the fragment in (replacing any stale VPN
    /// section), loads the merged ruleset, and enables pf when it is
    /// not already running. Returns the backup path.
    ///
    /// # Errors
    ///
    /// Fails on validation, IO, missing pfctl, or privilege denial; no
    /// host state is touched when validation fails.
    pub async fn enable(&self, config: &VpnRuleConfig) -> Result<PathBuf> {
        let fragment = generate_ruleset(config)?;

        if let Some(parent) = self.anchor_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.anchor_path, &fragment)?;

        let existing = self.read_host_ruleset()?;
        let backup = backup_name(&self.ruleset_path, Utc::now());
        std::fs::write(&backup, &existing)?;
        debug!(backup = %backup.display(), "backed up host ruleset");

        let merged = merge_ruleset(&existing, &fragment);
        std::fs::write(&self.ruleset_path, &merged)?;

        self.load_ruleset().await?;
        if !self.is_enabled().await? {
            self.run_pfctl(&["-e"]).await?;
        }

        info!(
            network = %config.vpn_network,
            external = %config.external_interface,
            "firewall rules installed"
        );
        Ok(backup)
    }

    /// Removes the VPN section and reloads the host ruleset.
    ///
    /// # Errors
    ///
    /// Fails on IO, missing pfctl, or privilege denial.
    pub async fn disable(&self) -> Result<()> {
        let existing = self.read_host_ruleset()?;
        let stripped = strip_ruleset(&existing);
        std::fs::write(&self.ruleset_path, &stripped)?;
        self.load_ruleset().await?;
        info!("firewall rules removed");
        Ok(())
    }

    /// Overwrites the host ruleset from a named backup and reloads.
    ///
    /// # Errors
    ///
    /// Fails when the backup does not exist, or on IO / pfctl failure.
    pub async fn restore(&self, backup: &Path) -> Result<()> {
        if !backup.exists() {
            return Err(FirewallError::BackupMissing {
                path: backup.display().to_string(),
            });
        }
        std::fs::copy(backup, &self.ruleset_path)?;
        self.load_ruleset().await?;
        info!(backup = %backup.display(), "host ruleset restored");
        Ok(())
    }

    /// Checks whether pf is enabled.
    ///
    /// # Errors
    ///
    /// Fails when pfctl is missing or cannot be queried.
    pub async fn is_enabled(&self) -> Result<bool> {
        let output = self.run_pfctl_capture(&["-s", "info"]).await?;
        Ok(output.contains("Status: Enabled"))
    }

    /// Returns the firewall state and loaded rule count.
    ///
    /// # Errors
    ///
    /// Fails when pfctl is missing or cannot be queried.
    pub async fn get_status(&self) -> Result<FirewallStatus> {
        let enabled = self.is_enabled().await?;
        let rule_count = self.get_active_rules().await?.len();
        Ok(FirewallStatus {
            enabled,
            rule_count,
        })
    }

    /// Returns the currently loaded rules, one per line.
    ///
    /// # Errors
    ///
    /// Fails when pfctl is missing or cannot be queried.
    pub async fn get_active_rules(&self) -> Result<Vec<String>> {
        let output = self.run_pfctl_capture(&["-s", "rules"]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Lists timestamped backups of the host ruleset.
    ///
    /// The naming scheme sorts lexicographically by time, so the last
    /// entry is the most recent.
    ///
    /// # Errors
    ///
    /// Fails when the ruleset directory cannot be read.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let Some(parent) = self.ruleset_path.parent() else {
            return Ok(Vec::new());
        };
        let Some(name) = self.ruleset_path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{name}.backup.");

        let entries = match std::fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(&prefix))
            {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Reads the host ruleset, treating a missing file as empty.
    fn read_host_ruleset(&self) -> Result<String> {
        match std::fs::read_to_string(&self.ruleset_path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_ruleset(&self) -> Result<()> {
        self.run_pfctl(&["-f", &self.ruleset_path.to_string_lossy()])
            .await
    }

    async fn run_pfctl(&self, args: &[&str]) -> Result<()> {
        self.run_pfctl_capture(args).await.map(|_| ())
    }

    async fn run_pfctl_capture(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "invoking pfctl");
        let output = Command::new("pfctl").args(args).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FirewallError::ToolMissing
            } else {
                FirewallError::Io(e)
            }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        // pfctl -e on an already-enabled filter is not a failure.
        if stderr.contains("pf already enabled") {
            return Ok(String::new());
        }

        if stderr.contains("Operation not permitted") || stderr.contains("Permission denied") {
            return Err(FirewallError::PermissionDenied { detail: stderr });
        }

        Err(FirewallError::CommandFailed { stderr })
    }
}
