//! IPv4 address pool allocation for the Warden VPN control plane.
//!
//! The pool owns the set of host addresses inside the VPN network. The
//! network address, broadcast address, and the server's own address are
//! reserved at construction and can never be handed to a peer.

pub mod error;
mod pool;

pub use error::{PoolError, Result};
pub use pool::{parse_ipv4, IpPool, NetworkInfo};
