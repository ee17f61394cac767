//! Neighbor Discovery wire formats
//!
//! Router Solicitation framing and Router Advertisement option decoding.

pub mod icmpv6;
pub mod ndp;
pub mod types;

pub use types::*;
