//! Error types for pool allocation.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur during pool construction or allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The CIDR string could not be parsed.
    #[error("invalid CIDR: {message}")]
    InvalidCidr {
        /// Description of the parse failure.
        message: String,
    },

    /// The network is not IPv4.
    #[error("only IPv4 networks are supported")]
    NotIpv4,

    /// The prefix leaves too few usable hosts.
    #[error("network too small: /{prefix} has fewer than 6 usable hosts")]
    NetworkTooSmall {
        /// The offending prefix length.
        prefix: u8,
    },

    /// No free addresses remain.
    #[error("address pool exhausted")]
    Exhausted,

    /// The address string could not be parsed.
    #[error("invalid IP address: {address}")]
    InvalidAddress {
        /// The malformed input.
        address: String,
    },

    /// The address is not inside the managed network.
    #[error("IP {ip} is outside the VPN network")]
    OutsideNetwork {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },

    /// The address is the network address.
    #[error("IP {ip} is the network address")]
    NetworkAddress {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },

    /// The address is the broadcast address.
    #[error("IP {ip} is the broadcast address")]
    BroadcastAddress {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },

    /// The address is reserved for the VPN server itself.
    #[error("IP {ip} is reserved for the server")]
    ReservedForServer {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },

    /// The address is already allocated.
    #[error("IP {ip} is already allocated")]
    AlreadyAllocated {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },

    /// The address is not currently allocated.
    #[error("IP {ip} is not allocated")]
    NotAllocated {
        /// The address that was rejected.
        ip: Ipv4Addr,
    },
}
