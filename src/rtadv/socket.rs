//! RA socket multiplexer
//!
//! One raw ICMPv6 receive descriptor shared by every interface. Each
//! interface holds a registration; inbound Router Advertisements are
//! demultiplexed by the IPV6_PKTINFO arrival interface and handed to that
//! registration's callback.

use super::interface::InterfaceInfo;
use super::timer::TimerCallout;
use crate::capture::{Icmpv6Socket, Icmpv6SocketFactory, ReceivedDatagram};
use crate::protocol::icmpv6::{Icmpv6Packet, Icmpv6Type, RouterSolicitation, RA_MSG_SIZE};
use crate::protocol::ndp::RouterAdvertisement;
use crate::protocol::{is_link_local, ALL_ROUTERS, ND_HOP_LIMIT};
use crate::telemetry::RtadvMetrics;
use crate::{Error, Result};
use std::collections::HashMap;
use std::io;
use std::net::Ipv6Addr;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

const RECV_BUF_SIZE: usize = 2048;

/// Called synchronously for every accepted RA on the interface
pub type RaCallback = Box<dyn FnMut(Arc<RouterAdvertisement>)>;

/// Registration handle; one per interface, not clonable
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RtadvSocketHandle(u32);

impl RtadvSocketHandle {
    pub fn if_index(&self) -> u32 {
        self.0
    }
}

/// Failure to send a Router Solicitation
#[derive(Debug, thiserror::Error)]
pub enum SolicitError {
    /// Link not ready yet; the retry schedule covers it
    #[error("transient send failure: {0}")]
    Transient(Error),
    #[error("send failure: {0}")]
    Hard(Error),
}

impl SolicitError {
    fn classify(err: Error) -> Self {
        let transient = match &err {
            Error::Io(e) => matches!(
                e.raw_os_error(),
                Some(libc::ENXIO) | Some(libc::ENETDOWN) | Some(libc::EADDRNOTAVAIL)
            ),
            _ => false,
        };
        if transient {
            SolicitError::Transient(err)
        } else {
            SolicitError::Hard(err)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SolicitError::Transient(_))
    }
}

struct Registration {
    interface: InterfaceInfo,
    receive_open: bool,
    callback: Option<RaCallback>,
    link_local: Option<Ipv6Addr>,
}

/// Why a datagram never reached a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TooShort,
    NotLinkLocal,
    MissingPacketInfo,
    MissingHopLimit,
    NotRouterAdvertisement,
    NonZeroCode,
    BadHopLimit,
    Malformed,
}

pub struct RtadvSocketManager {
    factory: Box<dyn Icmpv6SocketFactory>,
    registrations: HashMap<u32, Registration>,
    /// Registrations with receive enabled
    open_count: usize,
    socket: Option<Box<dyn Icmpv6Socket>>,
    /// Bumped on every open so pollers can tell descriptors apart
    generation: u64,
    close_timer: TimerCallout,
    close_delay: Duration,
    metrics: Arc<RtadvMetrics>,
    buf: Vec<u8>,
}

impl RtadvSocketManager {
    pub fn new(
        factory: Box<dyn Icmpv6SocketFactory>,
        close_delay: Duration,
        metrics: Arc<RtadvMetrics>,
    ) -> Self {
        Self {
            factory,
            registrations: HashMap::new(),
            open_count: 0,
            socket: None,
            generation: 0,
            close_timer: TimerCallout::new(),
            close_delay,
            metrics,
            buf: vec![0u8; RECV_BUF_SIZE],
        }
    }

    pub fn create(&mut self, interface: &InterfaceInfo) -> Result<RtadvSocketHandle> {
        if self.registrations.contains_key(&interface.index) {
            return Err(Error::AlreadyRegistered {
                if_index: interface.index,
            });
        }

        self.registrations.insert(
            interface.index,
            Registration {
                interface: interface.clone(),
                receive_open: false,
                callback: None,
                link_local: None,
            },
        );
        debug!(interface = %interface.name, "RA socket registration created");
        Ok(RtadvSocketHandle(interface.index))
    }

    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self.factory.open()?;
        self.socket = Some(socket);
        self.generation += 1;
        self.metrics.socket_opens.inc();
        debug!(generation = self.generation, "RA receive socket opened");
        Ok(())
    }

    fn close(&mut self) {
        self.close_timer.cancel();
        if self.socket.take().is_some() {
            self.metrics.socket_closes.inc();
            debug!("RA receive socket closed");
        }
    }

    /// Start delivering RAs for the interface to `callback`
    pub fn enable_receive(&mut self, handle: &RtadvSocketHandle, callback: RaCallback) -> Result<()> {
        let needs_claim = match self.registrations.get(&handle.0) {
            Some(reg) => !reg.receive_open,
            None => return Err(Error::NotRegistered { if_index: handle.0 }),
        };

        if needs_claim {
            self.open()?;
            self.open_count += 1;
        }
        self.close_timer.cancel();

        if let Some(reg) = self.registrations.get_mut(&handle.0) {
            reg.receive_open = true;
            reg.callback = Some(callback);
        }
        Ok(())
    }

    /// Stop delivering RAs; the last claim schedules the delayed close
    pub fn disable_receive(&mut self, handle: &RtadvSocketHandle, now: Instant) {
        let Some(reg) = self.registrations.get_mut(&handle.0) else {
            return;
        };
        reg.callback = None;
        reg.link_local = None;
        if !reg.receive_open {
            return;
        }
        reg.receive_open = false;

        self.open_count -= 1;
        if self.open_count == 0 && self.socket.is_some() {
            self.close_timer.set_relative(now, self.close_delay);
        }
    }

    /// Source address for solicitations, once the link-local passed DAD
    pub fn set_link_local(&mut self, handle: &RtadvSocketHandle, addr: Option<Ipv6Addr>) {
        if let Some(reg) = self.registrations.get_mut(&handle.0) {
            reg.link_local = addr;
        }
    }

    /// Send a Router Solicitation to all-routers out of the handle's interface
    pub fn send_solicitation(
        &mut self,
        handle: &RtadvSocketHandle,
        include_lladdr: bool,
    ) -> std::result::Result<(), SolicitError> {
        let (lladdr, source, name) = match self.registrations.get(&handle.0) {
            Some(reg) => (
                if include_lladdr {
                    reg.interface.solicitation_lladdr()
                } else {
                    None
                },
                reg.link_local,
                reg.interface.name.clone(),
            ),
            None => {
                return Err(SolicitError::Hard(Error::NotRegistered {
                    if_index: handle.0,
                }));
            }
        };

        let packet = RouterSolicitation::new(lladdr).to_bytes();

        let transient_open = self.socket.is_none();
        if transient_open {
            self.open().map_err(SolicitError::Hard)?;
        }

        let result = match &self.socket {
            Some(socket) => socket.send_to(&packet, ALL_ROUTERS, handle.0, source),
            None => Err(Error::AllocationFailed("RA socket".into())),
        };

        if transient_open && self.open_count == 0 {
            self.close();
        }

        match result {
            Ok(_) => {
                trace!(interface = %name, lladdr = lladdr.is_some(), "Router Solicitation sent");
                Ok(())
            }
            Err(e) => Err(SolicitError::classify(e)),
        }
    }

    /// Drop the registration; the last one closes the descriptor at once
    pub fn release(&mut self, handle: RtadvSocketHandle, now: Instant) {
        self.disable_receive(&handle, now);
        if let Some(reg) = self.registrations.remove(&handle.0) {
            debug!(interface = %reg.interface.name, "RA socket registration released");
        }
        if self.registrations.is_empty() {
            self.close();
        }
    }

    /// Read and dispatch every queued datagram; returns RAs delivered
    pub fn handle_readable(&mut self, now: Instant) -> usize {
        let mut delivered = 0;
        loop {
            let received = match &self.socket {
                Some(socket) => socket.recv(&mut self.buf),
                None => return delivered,
            };

            match received {
                Ok(datagram) => {
                    self.metrics.datagrams_received.inc();
                    if self.dispatch(&datagram, now) {
                        delivered += 1;
                    }
                }
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => return delivered,
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "RA socket receive failed");
                    return delivered;
                }
            }
        }
    }

    fn check(datagram: &ReceivedDatagram, bytes: &[u8]) -> std::result::Result<u32, DropReason> {
        if bytes.len() < RA_MSG_SIZE {
            return Err(DropReason::TooShort);
        }
        if !is_link_local(&datagram.source) {
            return Err(DropReason::NotLinkLocal);
        }
        let if_index = datagram.if_index.ok_or(DropReason::MissingPacketInfo)?;
        let hop_limit = datagram.hop_limit.ok_or(DropReason::MissingHopLimit)?;

        let icmp = Icmpv6Packet::parse(bytes).map_err(|_| DropReason::TooShort)?;
        if icmp.msg_type() != Icmpv6Type::RouterAdvertisement as u8 {
            return Err(DropReason::NotRouterAdvertisement);
        }
        if icmp.code() != 0 {
            return Err(DropReason::NonZeroCode);
        }
        if hop_limit != ND_HOP_LIMIT {
            return Err(DropReason::BadHopLimit);
        }
        Ok(if_index)
    }

    fn dispatch(&mut self, datagram: &ReceivedDatagram, now: Instant) -> bool {
        let bytes = &self.buf[..datagram.len.min(self.buf.len())];

        let if_index = match Self::check(datagram, bytes) {
            Ok(if_index) => if_index,
            Err(reason) => {
                self.metrics.datagrams_dropped.inc();
                info!(source = %datagram.source, ?reason, "dropping ICMPv6 datagram");
                return false;
            }
        };

        let Some(reg) = self.registrations.get_mut(&if_index) else {
            self.metrics.datagrams_unclaimed.inc();
            return false;
        };
        let Some(callback) = reg.callback.as_mut() else {
            self.metrics.datagrams_unclaimed.inc();
            return false;
        };

        match RouterAdvertisement::parse(datagram.source, now, bytes) {
            Ok(ra) => {
                trace!(
                    interface = %reg.interface.name,
                    source = %datagram.source,
                    lifetime = ra.router_lifetime(),
                    "Router Advertisement received"
                );
                callback(Arc::new(ra));
                true
            }
            Err(e) => {
                self.metrics.datagrams_dropped.inc();
                warn!(
                    interface = %reg.interface.name,
                    source = %datagram.source,
                    reason = ?DropReason::Malformed,
                    error = %e,
                    "dropping ICMPv6 datagram"
                );
                false
            }
        }
    }

    /// Fire the delayed close if due
    pub fn poll_timers(&mut self, now: Instant) {
        if self.close_timer.fire_if_due(now) && self.open_count == 0 {
            self.close();
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.close_timer.deadline()
    }

    pub fn is_descriptor_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Registrations currently receiving
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_receiving(&self, if_index: u32) -> bool {
        self.registrations
            .get(&if_index)
            .is_some_and(|reg| reg.receive_open && reg.callback.is_some())
    }

    /// Open-count of the descriptor, bumped on every reopen
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.socket.as_ref().and_then(|s| s.raw_fd())
    }
}
