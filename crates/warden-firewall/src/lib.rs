//! Packet filter driver for the Warden VPN control plane.
//!
//! Generates the pf ruleset fragment that NATs VPN traffic out of the
//! uplink interface and installs it into the host ruleset with a
//! timestamped backup. The fragment is bracketed by sentinel comments
//! so repeated enables stay idempotent.

pub mod driver;
pub mod error;
pub mod rules;

pub use driver::{FirewallStatus, PfDriver};
pub use error::{FirewallError, Result};
pub use rules::{
    backup_name, generate_ruleset, merge_ruleset, strip_ruleset, VpnRuleConfig, RULE_SENTINEL,
    RULE_SENTINEL_END,
};
