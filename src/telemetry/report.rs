//! Per-attempt acquisition report handed to the analytics sink.

use crate::rtadv::interface::LinkType;
use serde::Serialize;
use tracing::info;

/// Interface category the analytics backend buckets reports by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceCategory {
    Other,
    Wifi,
    Cellular,
    Wired,
}

impl From<LinkType> for InterfaceCategory {
    fn from(link_type: LinkType) -> Self {
        match link_type {
            LinkType::Ethernet => InterfaceCategory::Wired,
            LinkType::Wifi => InterfaceCategory::Wifi,
            LinkType::Cellular => InterfaceCategory::Cellular,
            LinkType::Loopback | LinkType::Other => InterfaceCategory::Other,
        }
    }
}

/// Outcome of one router discovery attempt on one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtadvReport {
    pub interface: String,
    pub category: InterfaceCategory,
    pub success: bool,
    /// Solicitations sent in this attempt.
    pub solicitations: u32,
    /// Time from start to the report, in milliseconds.
    pub elapsed_ms: u64,
    /// Restarts since the interface came up.
    pub restarts: u32,
    pub link_local_duplicated: bool,
    pub autoconf_address_acquired: bool,
    pub autoconf_address_deprecated: bool,
    pub autoconf_address_detached: bool,
    pub router_lifetime_zero: bool,
    /// Router lifetime of the current RA; `None` when there is no RA.
    pub router_lifetime: Option<u16>,
    /// 0xffff lifetime
    pub router_lifetime_infinite: bool,
    pub managed_flag: bool,
    pub other_flag: bool,
    pub dhcpv6_active: bool,
    pub dhcpv6_address_acquired: bool,
    pub dhcpv6_dns_acquired: bool,
    pub rdnss_acquired: bool,
    pub dnssl_acquired: bool,
    pub pref64_advertised: bool,
    pub clat46_configured: bool,
    pub pvd_advertised: bool,
    pub pvd_additional_info: bool,
}

impl RtadvReport {
    pub fn new(interface: &str, category: InterfaceCategory, success: bool) -> Self {
        Self {
            interface: interface.to_string(),
            category,
            success,
            solicitations: 0,
            elapsed_ms: 0,
            restarts: 0,
            link_local_duplicated: false,
            autoconf_address_acquired: false,
            autoconf_address_deprecated: false,
            autoconf_address_detached: false,
            router_lifetime_zero: false,
            router_lifetime: None,
            router_lifetime_infinite: false,
            managed_flag: false,
            other_flag: false,
            dhcpv6_active: false,
            dhcpv6_address_acquired: false,
            dhcpv6_dns_acquired: false,
            rdnss_acquired: false,
            dnssl_acquired: false,
            pref64_advertised: false,
            clat46_configured: false,
            pvd_advertised: false,
            pvd_additional_info: false,
        }
    }
}

/// Destination for [`RtadvReport`]s.
pub trait ReportSink {
    fn submit(&mut self, report: RtadvReport);
}

/// Sink that writes each report as one JSON log line.
#[derive(Debug, Default)]
pub struct LoggingReportSink;

impl ReportSink for LoggingReportSink {
    fn submit(&mut self, report: RtadvReport) {
        match serde_json::to_string(&report) {
            Ok(json) => info!(interface = %report.interface, report = %json, "rtadv report"),
            Err(e) => info!(interface = %report.interface, error = %e, "rtadv report not serializable"),
        }
    }
}
