//! The IPv4 pool allocator.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::{IpNet, Ipv4Net};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::{PoolError, Result};

/// Parses an IPv4 address, mapping failures onto [`PoolError::InvalidAddress`].
pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr> {
    s.parse().map_err(|_| PoolError::InvalidAddress {
        address: s.to_string(),
    })
}

/// A summary of the managed network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// The network in CIDR notation.
    pub network: String,
    /// The network address.
    pub network_address: Ipv4Addr,
    /// The broadcast address.
    pub broadcast_address: Ipv4Addr,
    /// The address reserved for the server.
    pub server_address: Ipv4Addr,
    /// Prefix length.
    pub prefix_len: u8,
    /// Total usable host addresses (network and broadcast excluded).
    pub total_hosts: u32,
    /// Usable addresses currently allocated (server included).
    pub allocated_hosts: u32,
    /// Usable addresses still free.
    pub available_hosts: u32,
}

/// Allocator for peer addresses inside the VPN network.
///
/// The network address, broadcast address, and the server address
/// (first usable host) are marked allocated at construction and are
/// refused by [`IpPool::allocate_specific`] and [`IpPool::release`].
#[derive(Debug)]
pub struct IpPool {
    cidr: Ipv4Net,
    server: Ipv4Addr,
    total_hosts: u32,
    allocated: RwLock<HashSet<Ipv4Addr>>,
}

impl IpPool {
    /// Creates a pool from an IPv4 CIDR such as `10.8.0.0/24`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidCidr`] on parse failure,
    /// [`PoolError::NotIpv4`] for IPv6 input, and
    /// [`PoolError::NetworkTooSmall`] for prefixes narrower than /29.
    pub fn new(cidr: &str) -> Result<Self> {
        let net: IpNet = cidr.parse().map_err(|e| PoolError::InvalidCidr {
            message: format!("{cidr}: {e}"),
        })?;

        let net = match net {
            IpNet::V4(v4) => v4,
            IpNet::V6(_) => return Err(PoolError::NotIpv4),
        };

        if net.prefix_len() > 29 {
            return Err(PoolError::NetworkTooSmall {
                prefix: net.prefix_len(),
            });
        }

        let network = net.network();
        let broadcast = net.broadcast();
        let server = Ipv4Addr::from(u32::from(network) + 1);
        let total_hosts = (2u64.pow(u32::from(32 - net.prefix_len())) - 2) as u32;

        let mut allocated = HashSet::new();
        allocated.insert(network);
        allocated.insert(broadcast);
        allocated.insert(server);

        debug!(
            network = %net,
            server = %server,
            total_hosts,
            "initialized address pool"
        );

        Ok(Self {
            cidr: net,
            server,
            total_hosts,
            allocated: RwLock::new(allocated),
        })
    }

    /// Allocates the lowest free address.
    ///
    /// Scans upward from the first address after the server slot and
    /// marks the winner allocated under the pool lock, so concurrent
    /// callers always receive distinct addresses.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when every usable address is taken.
    pub fn allocate(&self) -> Result<Ipv4Addr> {
        let mut allocated = self.allocated.write();

        let start = u32::from(self.cidr.network()) + 2;
        let broadcast = u32::from(self.cidr.broadcast());

        for candidate in start..broadcast {
            let ip = Ipv4Addr::from(candidate);
            if !allocated.contains(&ip) {
                allocated.insert(ip);
                debug!(ip = %ip, "allocated address");
                return Ok(ip);
            }
        }

        Err(PoolError::Exhausted)
    }

    /// Allocates a specific address.
    ///
    /// # Errors
    ///
    /// Returns a distinct error for each refusal: outside the network,
    /// the network address, the broadcast address, the server address,
    /// or an address already allocated.
    pub fn allocate_specific(&self, ip: Ipv4Addr) -> Result<()> {
        if !self.cidr.contains(&ip) {
            return Err(PoolError::OutsideNetwork { ip });
        }
        if ip == self.cidr.network() {
            return Err(PoolError::NetworkAddress { ip });
        }
        if ip == self.cidr.broadcast() {
            return Err(PoolError::BroadcastAddress { ip });
        }
        if ip == self.server {
            return Err(PoolError::ReservedForServer { ip });
        }

        let mut allocated = self.allocated.write();
        if allocated.contains(&ip) {
            return Err(PoolError::AlreadyAllocated { ip });
        }

        allocated.insert(ip);
        debug!(ip = %ip, "allocated specific address");
        Ok(())
    }

    /// Releases a previously allocated address.
    ///
    /// The structural addresses (network, broadcast, server) can never
    /// be released.
    ///
    /// # Errors
    ///
    /// Returns an error when the address is outside the network,
    /// structural, or not currently allocated.
    pub fn release(&self, ip: Ipv4Addr) -> Result<()> {
        if !self.cidr.contains(&ip) {
            return Err(PoolError::OutsideNetwork { ip });
        }
        if ip == self.server {
            return Err(PoolError::ReservedForServer { ip });
        }
        if ip == self.cidr.network() {
            return Err(PoolError::NetworkAddress { ip });
        }
        if ip == self.cidr.broadcast() {
            return Err(PoolError::BroadcastAddress { ip });
        }

        let mut allocated = self.allocated.write();
        if !allocated.remove(&ip) {
            return Err(PoolError::NotAllocated { ip });
        }

        debug!(ip = %ip, "released address");
        Ok(())
    }

    /// Checks whether an address is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, ip: Ipv4Addr) -> bool {
        self.allocated.read().contains(&ip)
    }

    /// Returns the address reserved for the server.
    #[must_use]
    pub const fn server_ip(&self) -> Ipv4Addr {
        self.server
    }

    /// Returns the managed network.
    #[must_use]
    pub const fn network(&self) -> Ipv4Net {
        self.cidr
    }

    /// Returns the allocated peer addresses, sorted, server excluded.
    #[must_use]
    pub fn allocated_list(&self) -> Vec<Ipv4Addr> {
        let allocated = self.allocated.read();
        let mut list: Vec<Ipv4Addr> = allocated
            .iter()
            .copied()
            .filter(|ip| {
                *ip != self.server
                    && *ip != self.cidr.network()
                    && *ip != self.cidr.broadcast()
            })
            .collect();
        list.sort_unstable();
        list
    }

    /// Returns the number of usable addresses still free.
    #[must_use]
    pub fn available_count(&self) -> u32 {
        self.total_hosts - self.allocated_usable_count()
    }

    /// Allocated share of the usable host range, as a percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total_hosts == 0 {
            return 0.0;
        }
        f64::from(self.allocated_usable_count()) / f64::from(self.total_hosts) * 100.0
    }

    /// Returns a summary of the network and allocation state.
    #[must_use]
    pub fn network_info(&self) -> NetworkInfo {
        let allocated = self.allocated_usable_count();
        NetworkInfo {
            network: self.cidr.to_string(),
            network_address: self.cidr.network(),
            broadcast_address: self.cidr.broadcast(),
            server_address: self.server,
            prefix_len: self.cidr.prefix_len(),
            total_hosts: self.total_hosts,
            allocated_hosts: allocated,
            available_hosts: self.total_hosts - allocated,
        }
    }

    /// Counts allocated addresses inside the usable host range.
    fn allocated_usable_count(&self) -> u32 {
        let network = self.cidr.network();
        let broadcast = self.cidr.broadcast();
        self.allocated
            .read()
            .iter()
            .filter(|ip| **ip != network && **ip != broadcast)
            .count() as u32
    }
}
