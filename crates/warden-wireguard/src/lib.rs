//! WireGuard control layer for the Warden VPN control plane.
//!
//! Three concerns live here:
//!
//! - [`keys`]: Curve25519 key pairs serialised as standard base64.
//! - [`config`]: the typed model of a WireGuard INI file, its renderer,
//!   and its parser. Unknown keys survive a parse/render round trip.
//! - [`driver`]: the on-host interface driver that writes the config
//!   file at mode 0600 and shells out to `wg`/`wg-quick`.

pub mod config;
pub mod driver;
pub mod error;
pub mod keys;

pub use config::{
    client_config, parse_config, render_config, InterfaceSection, PeerSection, WgConfig,
};
pub use driver::{InterfaceState, InterfaceStatus, RuntimePeer, WgDriver};
pub use error::{Result, WireGuardError};
pub use keys::{KeyPair, PrivateKey, PublicKey, KEY_SIZE};
