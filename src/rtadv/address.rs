//! Address collection for the "address changed" pass

use super::interface::Ipv6AddressInfo;
use crate::protocol::Ipv6Prefix;
use tracing::{debug, warn};

/// Usable global addresses on the interface, by source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedAddresses {
    pub autoconf: Vec<Ipv6AddressInfo>,
    pub dhcp: Vec<Ipv6AddressInfo>,
    /// Autoconf addresses past their preferred lifetime (still published)
    pub deprecated: usize,
    /// Autoconf addresses whose prefix is gone (not published)
    pub detached: usize,
}

impl CollectedAddresses {
    pub fn is_empty(&self) -> bool {
        self.autoconf.is_empty() && self.dhcp.is_empty()
    }

    /// Autoconf addresses first, then DHCPv6 leases
    pub fn all(&self) -> Vec<Ipv6AddressInfo> {
        self.autoconf.iter().chain(self.dhcp.iter()).copied().collect()
    }

    pub fn first_prefix(&self) -> Option<Ipv6Prefix> {
        self.autoconf
            .first()
            .or_else(|| self.dhcp.first())
            .map(Ipv6AddressInfo::prefix)
    }
}

/// Sort the interface's addresses into autoconf and DHCPv6 sets, skipping
/// link-local, manually configured and not-yet-ready addresses
pub fn collect(ifname: &str, addresses: &[Ipv6AddressInfo]) -> CollectedAddresses {
    let mut collected = CollectedAddresses::default();

    for addr in addresses {
        if addr.is_link_local() || !(addr.autoconf || addr.dhcp) {
            continue;
        }
        if addr.duplicated {
            warn!(interface = %ifname, address = %addr.addr, "duplicate address, skipping");
            continue;
        }
        if addr.tentative {
            debug!(interface = %ifname, address = %addr.addr, "address still tentative");
            continue;
        }

        if addr.autoconf {
            if addr.deprecated {
                collected.deprecated += 1;
            }
            if addr.detached {
                collected.detached += 1;
                continue;
            }
            collected.autoconf.push(*addr);
        } else {
            collected.dhcp.push(*addr);
        }
    }

    collected
}
