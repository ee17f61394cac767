//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Router discovery tunables (rtadv.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RtadvConfig {
    pub solicitation: SolicitationConfig,
    pub restart: RestartConfig,
    pub socket: SocketConfig,
    pub pvd: PvdConfig,
    pub dhcpv6: Dhcpv6Config,
    pub clat46: Clat46Config,
    pub logging: LoggingConfig,
}

/// Router Solicitation schedule (RFC 4861 section 10)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolicitationConfig {
    /// MAX_RTR_SOLICITATIONS
    pub max_solicitations: u32,
    /// RTR_SOLICITATION_INTERVAL
    pub interval_secs: u64,
    /// Upper bound of the random offset added to each interval
    pub jitter_ms: u64,
    /// Wait after the last solicitation before declaring failure
    pub acquisition_failure_timeout_secs: u64,
}

impl Default for SolicitationConfig {
    fn default() -> Self {
        Self {
            max_solicitations: 3,
            interval_secs: 4,
            jitter_ms: 1000,
            acquisition_failure_timeout_secs: 8,
        }
    }
}

impl SolicitationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn acquisition_failure_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_failure_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Upper bound of the random delay before soliciting again
    pub max_delay_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self { max_delay_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Grace period before the shared receive descriptor is closed
    pub close_delay_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: 1000,
        }
    }
}

impl SocketConfig {
    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

/// PvD additional-information fetching (RFC 8801)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PvdConfig {
    pub enabled: bool,
    /// Minimum time between two fetches for the same PvD ID
    pub min_refetch_secs: u64,
    /// Lifetime of additional information without an "expires" key
    pub default_expiration_secs: u64,
}

impl Default for PvdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_refetch_secs: 10,
            default_expiration_secs: 86400,
        }
    }
}

impl PvdConfig {
    pub fn min_refetch(&self) -> Duration {
        Duration::from_secs(self.min_refetch_secs)
    }

    pub fn default_expiration(&self) -> Duration {
        Duration::from_secs(self.default_expiration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Dhcpv6Config {
    /// Follow the RA M/O flags with a DHCPv6 client
    pub enabled: bool,
    /// Prefer temporary (privacy) addresses for stateful DHCPv6
    pub privacy_addresses: bool,
}

impl Default for Dhcpv6Config {
    fn default() -> Self {
        Self {
            enabled: true,
            privacy_addresses: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Clat46Config {
    /// Synthesize IPv4 over NAT64 when PREF64 is advertised
    pub enabled: bool,
}

impl Default for Clat46Config {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug, trace
    pub level: String,
    /// pretty, compact, json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
