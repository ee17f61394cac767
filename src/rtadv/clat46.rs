//! CLAT46 synthetic IPv4 address pool
//!
//! Four addresses, 192.0.0.2 through 192.0.0.5 (RFC 7335), shared by
//! every interface running 464XLAT. Callers hold the last octet
//! ("partial address") they were handed.

use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

const SLOTS: usize = 4;

/// Lowest partial address handed out
pub const FIRST_PARTIAL: u8 = 2;

/// Highest partial address handed out
pub const LAST_PARTIAL: u8 = FIRST_PARTIAL + SLOTS as u8 - 1;

#[derive(Debug, Default)]
pub struct Clat46AddressPool {
    counts: [u32; SLOTS],
}

impl Clat46AddressPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the first unused address, or share the first one when
    /// every address is taken
    pub fn allocate(&mut self, ifname: &str) -> u8 {
        let slot = match self.counts.iter().position(|&c| c == 0) {
            Some(slot) => slot,
            None => {
                warn!(
                    interface = %ifname,
                    address = %Self::address(FIRST_PARTIAL),
                    "CLAT46 pool exhausted, reusing address"
                );
                0
            }
        };

        self.counts[slot] += 1;
        let partial = FIRST_PARTIAL + slot as u8;
        info!(
            interface = %ifname,
            address = %Self::address(partial),
            "CLAT46 address allocated"
        );
        partial
    }

    pub fn release(&mut self, ifname: &str, partial: u8) {
        if !(FIRST_PARTIAL..=LAST_PARTIAL).contains(&partial) {
            error!(interface = %ifname, partial, "CLAT46 release of invalid address");
            return;
        }

        let slot = (partial - FIRST_PARTIAL) as usize;
        let address = Self::address(partial);
        match self.counts[slot] {
            0 => error!(interface = %ifname, %address, "CLAT46 release of unused address"),
            1 => {
                self.counts[slot] = 0;
                info!(interface = %ifname, %address, "CLAT46 address released");
            }
            n => {
                self.counts[slot] = n - 1;
                debug!(interface = %ifname, %address, remaining = n - 1, "CLAT46 address still in use");
            }
        }
    }

    /// IPv4 address for a partial address value
    pub fn address(partial: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 0, partial)
    }

    /// Current use count of one address
    pub fn use_count(&self, partial: u8) -> u32 {
        if !(FIRST_PARTIAL..=LAST_PARTIAL).contains(&partial) {
            return 0;
        }
        self.counts[(partial - FIRST_PARTIAL) as usize]
    }

    /// Allocations not yet released
    pub fn outstanding(&self) -> u32 {
        self.counts.iter().sum()
    }
}
