//! rtadv - IPv6 Router Advertisement client
//!
//! Per-interface Router Solicitation / Router Advertisement state machine,
//! the shared ICMPv6 socket multiplexer it receives through, and the
//! DHCPv6, CLAT46, PvD and publishing boundaries it coordinates.

pub mod capture;
pub mod config;
pub mod error;
pub mod protocol;
pub mod rtadv;
pub mod telemetry;

pub use error::{Error, Result};
