//! Telemetry: logging, counters and per-attempt reports.
//!
//! Provides:
//! - Logging initialization
//! - Router discovery counters
//! - The acquisition report handed to the analytics sink

mod logging;
mod metrics;
mod report;

pub use logging::init_logging;
pub use metrics::{Counter, InterfaceCounter, InterfaceStats, RtadvMetrics};
pub use report::{InterfaceCategory, LoggingReportSink, ReportSink, RtadvReport};
