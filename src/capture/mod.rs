//! Raw ICMPv6 transport
//!
//! The router-discovery core only sees these traits; the Linux raw socket
//! lives in `raw_icmpv6`, and tests plug in in-memory fakes.

mod raw_icmpv6;

pub use raw_icmpv6::{RawIcmpv6Socket, RawIcmpv6SocketFactory};

use crate::Result;
use std::net::Ipv6Addr;
use std::os::unix::io::RawFd;

/// Information about a received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedDatagram {
    /// Number of bytes received
    pub len: usize,
    /// Source address of the sender
    pub source: Ipv6Addr,
    /// Arrival interface from IPV6_PKTINFO, if the kernel supplied it
    pub if_index: Option<u32>,
    /// Hop limit from IPV6_HOPLIMIT, if the kernel supplied it
    pub hop_limit: Option<u8>,
}

/// Non-blocking raw ICMPv6 socket
///
/// `recv` returns `ErrorKind::WouldBlock` wrapped in `Error::Io` when the
/// queue is empty.
pub trait Icmpv6Socket {
    /// Send an ICMPv6 message to `dest` out of `if_index`, optionally
    /// pinning the source address
    fn send_to(
        &self,
        packet: &[u8],
        dest: Ipv6Addr,
        if_index: u32,
        source: Option<Ipv6Addr>,
    ) -> Result<usize>;

    /// Receive one datagram along with its ancillary data
    fn recv(&self, buf: &mut [u8]) -> Result<ReceivedDatagram>;

    /// Descriptor for readiness polling; `None` for sockets that are not
    /// backed by the kernel
    fn raw_fd(&self) -> Option<RawFd>;
}

/// Opens the shared receive descriptor
pub trait Icmpv6SocketFactory {
    fn open(&self) -> Result<Box<dyn Icmpv6Socket>>;
}
