//! DHCPv6 client boundary
//!
//! The state machine picks the mode from the RA M/O flags and starts or
//! stops the client; status changes come back as `RtadvEvent`s through the
//! notifier handed to the factory.

use super::event::InterfaceNotifier;
use super::interface::InterfaceInfo;
use crate::protocol::ndp::RaFlags;
use crate::Result;
use std::net::Ipv6Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dhcpv6Mode {
    /// Information-request only (O flag)
    Stateless,
    /// IA_NA address leasing (M flag)
    StatefulAddress,
}

impl Dhcpv6Mode {
    /// Mode the RA flags call for, `None` when DHCPv6 is not wanted
    pub fn from_ra_flags(flags: RaFlags) -> Option<Self> {
        if flags.managed {
            Some(Dhcpv6Mode::StatefulAddress)
        } else if flags.other {
            Some(Dhcpv6Mode::Stateless)
        } else {
            None
        }
    }
}

/// Aggregated configuration learned by the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dhcpv6Info {
    pub addresses: Vec<Ipv6Addr>,
    pub dns_servers: Vec<Ipv6Addr>,
    pub dns_domains: Vec<String>,
}

pub trait Dhcpv6Client {
    fn set_mode(&mut self, mode: Dhcpv6Mode);
    fn set_privacy(&mut self, enabled: bool);
    fn start(&mut self);
    fn stop(&mut self);
    fn is_active(&self) -> bool;
    fn has_dns(&self) -> bool;
    fn has_addresses(&self) -> bool;
    fn info(&self) -> Dhcpv6Info;
}

pub trait Dhcpv6ClientFactory {
    /// Create a client bound to `interface`; it reports through `notifier`
    fn create(
        &mut self,
        interface: &InterfaceInfo,
        notifier: InterfaceNotifier,
    ) -> Result<Box<dyn Dhcpv6Client>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ndp::RouterPreference;

    fn flags(managed: bool, other: bool) -> RaFlags {
        RaFlags {
            managed,
            other,
            home_agent: false,
            proxy: false,
            preference: RouterPreference::Medium,
        }
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(
            Dhcpv6Mode::from_ra_flags(flags(true, false)),
            Some(Dhcpv6Mode::StatefulAddress)
        );
        assert_eq!(
            Dhcpv6Mode::from_ra_flags(flags(true, true)),
            Some(Dhcpv6Mode::StatefulAddress)
        );
        assert_eq!(
            Dhcpv6Mode::from_ra_flags(flags(false, true)),
            Some(Dhcpv6Mode::Stateless)
        );
        assert_eq!(Dhcpv6Mode::from_ra_flags(flags(false, false)), None);
    }
}
