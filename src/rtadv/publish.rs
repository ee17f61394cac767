//! Configuration publishing boundary

use super::interface::Ipv6AddressInfo;
use crate::protocol::{Ipv6Prefix, MacAddr};
use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Reason attached to a failure publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    NetworkChanged,
    MediaInactive,
    ResourceUnavailable,
    InternalError,
    AddressInUse,
    /// Interface type cannot run router discovery
    InvalidOperation,
}

/// Synthesized IPv4 configuration for CLAT46
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4SyntheticConfig {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub nat64_prefix: Ipv6Prefix,
}

/// Everything published in one success update
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub addresses: Vec<Ipv6AddressInfo>,
    pub routers: Vec<Ipv6Addr>,
    pub dns_servers: Vec<Ipv6Addr>,
    pub dns_domains: Vec<String>,
    pub mtu: Option<u32>,
    pub pvd_id: Option<String>,
    pub pvd_additional_info: Option<Value>,
    pub ipv4_synthetic: Option<Ipv4SyntheticConfig>,
}

/// Downstream consumer of the interface's IPv6 configuration
pub trait Publisher {
    fn publish_success(&mut self, ifname: &str, info: ServiceInfo, signature: &str);
    fn publish_failure(&mut self, ifname: &str, status: PublishStatus);
    /// Withdraw everything published for the interface
    fn unpublish(&mut self, ifname: &str);
    fn unpublish_clat46(&mut self, ifname: &str);
    fn detach_ipv4(&mut self, ifname: &str);
    fn report_address_conflict(&mut self, ifname: &str, addr: Ipv6Addr);
    fn generate_failure_symptom(&mut self, ifname: &str);
    fn is_published(&self, ifname: &str) -> bool;
    fn is_busy(&self, ifname: &str) -> bool;
    fn set_busy(&mut self, ifname: &str, busy: bool);
    /// A native (non-CLAT46) IPv4 configuration is published
    fn has_native_ipv4(&self, ifname: &str) -> bool;
}

/// Change-detection key for a published configuration
pub fn signature(prefix: Ipv6Prefix, router_hw_addr: Option<MacAddr>) -> String {
    match router_hw_addr {
        Some(mac) => format!(
            "IPv6.Prefix={};IPv6.RouterHardwareAddress={}",
            prefix, mac
        ),
        None => format!("IPv6.Prefix={}", prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let prefix = Ipv6Prefix::new("2001:db8:1::".parse().unwrap(), 64);
        let mac = MacAddr([0x00, 0x1b, 0x63, 0x84, 0x45, 0xe6]);
        assert_eq!(
            signature(prefix, Some(mac)),
            "IPv6.Prefix=2001:db8:1::/64;IPv6.RouterHardwareAddress=00:1b:63:84:45:e6"
        );
        assert_eq!(signature(prefix, None), "IPv6.Prefix=2001:db8:1::/64");
    }
}
