//! Interface layer boundary
//!
//! Link status, address lists and the kernel knobs the state machine turns.
//! Owned by the surrounding daemon; the core only calls through the trait.

use crate::protocol::{is_link_local, Ipv6Prefix, MacAddr};
use crate::Result;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Link media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    Ethernet,
    Wifi,
    Cellular,
    Loopback,
    Other,
}

impl LinkType {
    /// Links that carry a source link-layer address option
    pub fn is_ethernet_like(self) -> bool {
        matches!(self, LinkType::Ethernet | LinkType::Wifi)
    }
}

/// Static description of one network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub index: u32,
    pub name: String,
    pub link_type: LinkType,
    pub hw_addr: Option<MacAddr>,
}

impl InterfaceInfo {
    pub fn new(index: u32, name: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            index,
            name: name.into(),
            link_type,
            hw_addr: None,
        }
    }

    pub fn with_hw_addr(mut self, mac: MacAddr) -> Self {
        self.hw_addr = Some(mac);
        self
    }

    pub fn is_cellular(&self) -> bool {
        self.link_type == LinkType::Cellular
    }

    /// Hardware address for the RS source link-layer option, if this link
    /// type carries one
    pub fn solicitation_lladdr(&self) -> Option<MacAddr> {
        if !self.link_type.is_ethernet_like() {
            return None;
        }
        self.hw_addr.filter(|mac| !mac.is_zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub valid: bool,
    pub active: bool,
}

impl LinkStatus {
    pub const UP: LinkStatus = LinkStatus {
        valid: true,
        active: true,
    };

    pub const DOWN: LinkStatus = LinkStatus {
        valid: true,
        active: false,
    };

    pub fn is_up(&self) -> bool {
        self.valid && self.active
    }
}

/// One IPv6 address assigned to an interface, with its kernel flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6AddressInfo {
    pub addr: Ipv6Addr,
    pub prefix_len: u8,
    /// DAD in progress
    pub tentative: bool,
    /// DAD failed
    pub duplicated: bool,
    pub deprecated: bool,
    /// Prefix no longer advertised by any router
    pub detached: bool,
    /// Formed by stateless autoconfiguration
    pub autoconf: bool,
    /// Leased from DHCPv6
    pub dhcp: bool,
}

impl Ipv6AddressInfo {
    pub fn new(addr: Ipv6Addr, prefix_len: u8) -> Self {
        Self {
            addr,
            prefix_len,
            tentative: false,
            duplicated: false,
            deprecated: false,
            detached: false,
            autoconf: false,
            dhcp: false,
        }
    }

    pub fn is_link_local(&self) -> bool {
        is_link_local(&self.addr)
    }

    /// Finished DAD successfully
    pub fn is_ready(&self) -> bool {
        !self.tentative && !self.duplicated
    }

    pub fn prefix(&self) -> Ipv6Prefix {
        Ipv6Prefix::new(self.addr, self.prefix_len)
    }
}

/// IPv4 address as installed on an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4AddressConfig {
    pub addr: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub broadcast: Option<Ipv4Addr>,
}

/// Kernel / ioctl primitives the state machine depends on
pub trait InterfaceLayer {
    fn link_status(&self, ifname: &str) -> LinkStatus;

    fn ipv6_addresses(&self, ifname: &str) -> Result<Vec<Ipv6AddressInfo>>;

    /// Toggle kernel acceptance of Router Advertisements
    fn set_ra_acceptance(&mut self, ifname: &str, enable: bool) -> Result<()>;

    /// Toggle kernel CLAT46 translation
    fn set_clat46(&mut self, ifname: &str, enable: bool) -> Result<()>;

    /// Remove kernel-installed autoconf prefixes and default routes
    fn flush_prefixes_and_routes(&mut self, ifname: &str) -> Result<()>;

    /// Number of default routers the kernel still holds for the link
    fn router_count(&self, if_index: u32) -> u32;

    fn remove_ipv6_address(&mut self, ifname: &str, addr: Ipv6Addr) -> Result<()>;

    /// Re-add addresses with DAD forced and no delay
    fn reassert_ipv6_addresses(&mut self, ifname: &str, addrs: &[Ipv6AddressInfo]) -> Result<()>;

    fn set_ipv4_address(&mut self, ifname: &str, config: Ipv4AddressConfig) -> Result<()>;

    fn remove_ipv4_address(&mut self, ifname: &str, addr: Ipv4Addr) -> Result<()>;

    fn set_arp_suppression(&mut self, ifname: &str, enable: bool) -> Result<()>;

    fn set_nat64_prefixes(&mut self, ifname: &str, prefixes: &[Ipv6Prefix]) -> Result<()>;

    fn remove_nat64_prefixes(&mut self, ifname: &str) -> Result<()>;

    /// NAT64 prefix learned by PLAT discovery (RFC 7050), if any
    fn discovered_nat64_prefix(&self, ifname: &str) -> Option<Ipv6Prefix>;

    fn start_plat_discovery(&mut self, ifname: &str) -> Result<()>;
}
