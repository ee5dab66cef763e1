//! QR encoding of client configurations.
//!
//! Three output shapes over the same bitmap: raw PNG bytes, a
//! `data:image/png;base64,...` URL, and a two-cell-wide terminal
//! rendering with a one-module quiet border.

pub mod encoder;
pub mod error;

pub use encoder::{QrEncoder, DEFAULT_SIZE};
pub use error::{QrError, Result};

/// Validates that `config` looks like a WireGuard client config and
/// encodes it as PNG bytes.
///
/// # Errors
///
/// Rejects empty input and text missing either section header.
pub fn wireguard_config_png(config: &str, size: u32) -> Result<Vec<u8>> {
    validate_wireguard_config(config)?;
    QrEncoder::default().to_png(config, size)
}

/// Validates and encodes a WireGuard client config as a base64 data URL.
///
/// # Errors
///
/// Rejects empty input and text missing either section header.
pub fn wireguard_config_base64(config: &str, size: u32) -> Result<String> {
    validate_wireguard_config(config)?;
    QrEncoder::default().to_base64(config, size)
}

/// Validates and encodes a WireGuard client config as terminal art.
///
/// # Errors
///
/// Rejects empty input and text missing either section header.
pub fn wireguard_config_terminal(config: &str) -> Result<String> {
    validate_wireguard_config(config)?;
    QrEncoder::default().to_terminal(config)
}

fn validate_wireguard_config(config: &str) -> Result<()> {
    if config.is_empty() {
        return Err(QrError::EmptyInput);
    }
    if !config.contains("[Interface]") || !config.contains("[Peer]") {
        return Err(QrError::NotWireGuardConfig);
    }
    Ok(())
}
