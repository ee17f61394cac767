//! In-memory collaborators for state machine tests

use super::dhcpv6::{Dhcpv6Client, Dhcpv6ClientFactory, Dhcpv6Info, Dhcpv6Mode};
use super::event::{EventReceiver, EventSender, InterfaceNotifier, RtadvEvent};
use super::interface::{
    InterfaceInfo, InterfaceLayer, Ipv4AddressConfig, Ipv6AddressInfo, LinkStatus,
};
use super::publish::{PublishStatus, Publisher, ServiceInfo};
use super::pvd::{PvdFetcher, PvdRequest, PvdRequestId};
use super::service::RtadvEnv;
use super::socket::RtadvSocketManager;
use super::clat46::Clat46AddressPool;
use crate::capture::{Icmpv6Socket, Icmpv6SocketFactory, ReceivedDatagram};
use crate::config::RtadvConfig;
use crate::protocol::Ipv6Prefix;
use crate::telemetry::{ReportSink, RtadvMetrics, RtadvReport};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ICMPv6 socket

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub packet: Vec<u8>,
    pub dest: Ipv6Addr,
    pub if_index: u32,
    pub source: Option<Ipv6Addr>,
}

#[derive(Default)]
struct NetState {
    opens: usize,
    closes: usize,
    fail_open: bool,
    send_errno: Option<i32>,
    send_attempts: usize,
    sent: Vec<SentPacket>,
    inbound: VecDeque<(ReceivedDatagram, Vec<u8>)>,
}

/// Network shared by every socket the factory opens
#[derive(Clone, Default)]
pub struct FakeNet(Rc<RefCell<NetState>>);

impl FakeNet {
    pub fn factory(&self) -> FakeSocketFactory {
        FakeSocketFactory(self.clone())
    }

    pub fn opens(&self) -> usize {
        self.0.borrow().opens
    }

    pub fn closes(&self) -> usize {
        self.0.borrow().closes
    }

    pub fn fail_open(&self, fail: bool) {
        self.0.borrow_mut().fail_open = fail;
    }

    pub fn fail_send(&self, errno: Option<i32>) {
        self.0.borrow_mut().send_errno = errno;
    }

    pub fn send_attempts(&self) -> usize {
        self.0.borrow().send_attempts
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.0.borrow().sent.clone()
    }

    pub fn inject(
        &self,
        source: Ipv6Addr,
        if_index: Option<u32>,
        hop_limit: Option<u8>,
        bytes: &[u8],
    ) {
        let datagram = ReceivedDatagram {
            len: bytes.len(),
            source,
            if_index,
            hop_limit,
        };
        self.0
            .borrow_mut()
            .inbound
            .push_back((datagram, bytes.to_vec()));
    }
}

pub struct FakeSocketFactory(FakeNet);

impl Icmpv6SocketFactory for FakeSocketFactory {
    fn open(&self) -> Result<Box<dyn Icmpv6Socket>> {
        let mut state = self.0.0.borrow_mut();
        if state.fail_open {
            return Err(Error::Io(io::Error::from_raw_os_error(libc::EMFILE)));
        }
        state.opens += 1;
        Ok(Box::new(FakeSocket(self.0.clone())))
    }
}

struct FakeSocket(FakeNet);

impl Icmpv6Socket for FakeSocket {
    fn send_to(
        &self,
        packet: &[u8],
        dest: Ipv6Addr,
        if_index: u32,
        source: Option<Ipv6Addr>,
    ) -> Result<usize> {
        let mut state = self.0.0.borrow_mut();
        state.send_attempts += 1;
        if let Some(errno) = state.send_errno {
            return Err(Error::Io(io::Error::from_raw_os_error(errno)));
        }
        state.sent.push(SentPacket {
            packet: packet.to_vec(),
            dest,
            if_index,
            source,
        });
        Ok(packet.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<ReceivedDatagram> {
        let Some((mut datagram, bytes)) = self.0.0.borrow_mut().inbound.pop_front() else {
            return Err(Error::Io(io::Error::from(io::ErrorKind::WouldBlock)));
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        datagram.len = len;
        Ok(datagram)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

impl Drop for FakeSocket {
    fn drop(&mut self) {
        self.0.0.borrow_mut().closes += 1;
    }
}

// ---------------------------------------------------------------------------
// Interface layer

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfCall {
    RaAcceptance(bool),
    Clat46(bool),
    FlushPrefixes,
    RemoveIpv6(Ipv6Addr),
    Reassert(Vec<Ipv6Addr>),
    SetIpv4(Ipv4AddressConfig),
    RemoveIpv4(Ipv4Addr),
    ArpSuppression(bool),
    SetNat64(Vec<Ipv6Prefix>),
    RemoveNat64,
    PlatDiscovery,
}

struct IfState {
    link: LinkStatus,
    addresses: Vec<Ipv6AddressInfo>,
    router_count: u32,
    discovered_nat64: Option<Ipv6Prefix>,
    calls: Vec<IfCall>,
}

/// Kernel view of the interface under test
#[derive(Clone)]
pub struct FakeInterfaces(Rc<RefCell<IfState>>);

impl Default for FakeInterfaces {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(IfState {
            link: LinkStatus::UP,
            addresses: vec![link_local("fe80::1:2")],
            router_count: 1,
            discovered_nat64: None,
            calls: Vec::new(),
        })))
    }
}

impl FakeInterfaces {
    pub fn set_link(&self, link: LinkStatus) {
        self.0.borrow_mut().link = link;
    }

    pub fn set_addresses(&self, addresses: Vec<Ipv6AddressInfo>) {
        self.0.borrow_mut().addresses = addresses;
    }

    pub fn add_address(&self, address: Ipv6AddressInfo) {
        self.0.borrow_mut().addresses.push(address);
    }

    /// Apply `f` to the address equal to `addr`
    pub fn update_address(&self, addr: Ipv6Addr, f: impl FnOnce(&mut Ipv6AddressInfo)) {
        if let Some(a) = self.0.borrow_mut().addresses.iter_mut().find(|a| a.addr == addr) {
            f(a);
        }
    }

    pub fn remove_autoconf(&self) {
        self.0.borrow_mut().addresses.retain(|a| !a.autoconf);
    }

    pub fn set_router_count(&self, count: u32) {
        self.0.borrow_mut().router_count = count;
    }

    pub fn set_discovered_nat64(&self, prefix: Option<Ipv6Prefix>) {
        self.0.borrow_mut().discovered_nat64 = prefix;
    }

    pub fn calls(&self) -> Vec<IfCall> {
        self.0.borrow().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&IfCall) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: IfCall) -> Result<()> {
        self.0.borrow_mut().calls.push(call);
        Ok(())
    }
}

impl InterfaceLayer for FakeInterfaces {
    fn link_status(&self, _ifname: &str) -> LinkStatus {
        self.0.borrow().link
    }

    fn ipv6_addresses(&self, _ifname: &str) -> Result<Vec<Ipv6AddressInfo>> {
        Ok(self.0.borrow().addresses.clone())
    }

    fn set_ra_acceptance(&mut self, _ifname: &str, enable: bool) -> Result<()> {
        self.record(IfCall::RaAcceptance(enable))
    }

    fn set_clat46(&mut self, _ifname: &str, enable: bool) -> Result<()> {
        self.record(IfCall::Clat46(enable))
    }

    fn flush_prefixes_and_routes(&mut self, _ifname: &str) -> Result<()> {
        self.record(IfCall::FlushPrefixes)
    }

    fn router_count(&self, _if_index: u32) -> u32 {
        self.0.borrow().router_count
    }

    fn remove_ipv6_address(&mut self, _ifname: &str, addr: Ipv6Addr) -> Result<()> {
        self.0.borrow_mut().addresses.retain(|a| a.addr != addr);
        self.record(IfCall::RemoveIpv6(addr))
    }

    fn reassert_ipv6_addresses(&mut self, _ifname: &str, addrs: &[Ipv6AddressInfo]) -> Result<()> {
        self.record(IfCall::Reassert(addrs.iter().map(|a| a.addr).collect()))
    }

    fn set_ipv4_address(&mut self, _ifname: &str, config: Ipv4AddressConfig) -> Result<()> {
        self.record(IfCall::SetIpv4(config))
    }

    fn remove_ipv4_address(&mut self, _ifname: &str, addr: Ipv4Addr) -> Result<()> {
        self.record(IfCall::RemoveIpv4(addr))
    }

    fn set_arp_suppression(&mut self, _ifname: &str, enable: bool) -> Result<()> {
        self.record(IfCall::ArpSuppression(enable))
    }

    fn set_nat64_prefixes(&mut self, _ifname: &str, prefixes: &[Ipv6Prefix]) -> Result<()> {
        self.record(IfCall::SetNat64(prefixes.to_vec()))
    }

    fn remove_nat64_prefixes(&mut self, _ifname: &str) -> Result<()> {
        self.record(IfCall::RemoveNat64)
    }

    fn discovered_nat64_prefix(&self, _ifname: &str) -> Option<Ipv6Prefix> {
        self.0.borrow().discovered_nat64
    }

    fn start_plat_discovery(&mut self, _ifname: &str) -> Result<()> {
        self.record(IfCall::PlatDiscovery)
    }
}

pub fn link_local(addr: &str) -> Ipv6AddressInfo {
    Ipv6AddressInfo::new(addr.parse().unwrap(), 64)
}

pub fn autoconf(addr: &str) -> Ipv6AddressInfo {
    let mut info = Ipv6AddressInfo::new(addr.parse().unwrap(), 64);
    info.autoconf = true;
    info
}

// ---------------------------------------------------------------------------
// DHCPv6

#[derive(Default)]
struct Dhcpv6State {
    created: u32,
    fail_create: bool,
    mode: Option<Dhcpv6Mode>,
    privacy: bool,
    active: bool,
    starts: u32,
    stops: u32,
    info: Dhcpv6Info,
}

/// Factory and the clients it creates share one state
#[derive(Clone, Default)]
pub struct FakeDhcpv6(Rc<RefCell<Dhcpv6State>>);

impl FakeDhcpv6 {
    pub fn created(&self) -> u32 {
        self.0.borrow().created
    }

    pub fn fail_create(&self, fail: bool) {
        self.0.borrow_mut().fail_create = fail;
    }

    pub fn mode(&self) -> Option<Dhcpv6Mode> {
        self.0.borrow().mode
    }

    pub fn privacy(&self) -> bool {
        self.0.borrow().privacy
    }

    pub fn is_active(&self) -> bool {
        self.0.borrow().active
    }

    pub fn starts(&self) -> u32 {
        self.0.borrow().starts
    }

    pub fn stops(&self) -> u32 {
        self.0.borrow().stops
    }

    pub fn set_info(&self, info: Dhcpv6Info) {
        self.0.borrow_mut().info = info;
    }
}

impl Dhcpv6ClientFactory for FakeDhcpv6 {
    fn create(
        &mut self,
        _interface: &InterfaceInfo,
        _notifier: InterfaceNotifier,
    ) -> Result<Box<dyn Dhcpv6Client>> {
        let mut state = self.0.borrow_mut();
        if state.fail_create {
            return Err(Error::AllocationFailed("DHCPv6 client".into()));
        }
        state.created += 1;
        Ok(Box::new(FakeDhcpv6Client(self.0.clone())))
    }
}

struct FakeDhcpv6Client(Rc<RefCell<Dhcpv6State>>);

impl Dhcpv6Client for FakeDhcpv6Client {
    fn set_mode(&mut self, mode: Dhcpv6Mode) {
        self.0.borrow_mut().mode = Some(mode);
    }

    fn set_privacy(&mut self, enabled: bool) {
        self.0.borrow_mut().privacy = enabled;
    }

    fn start(&mut self) {
        let mut state = self.0.borrow_mut();
        state.active = true;
        state.starts += 1;
    }

    fn stop(&mut self) {
        let mut state = self.0.borrow_mut();
        state.active = false;
        state.stops += 1;
    }

    fn is_active(&self) -> bool {
        self.0.borrow().active
    }

    fn has_dns(&self) -> bool {
        !self.0.borrow().info.dns_servers.is_empty()
    }

    fn has_addresses(&self) -> bool {
        !self.0.borrow().info.addresses.is_empty()
    }

    fn info(&self) -> Dhcpv6Info {
        self.0.borrow().info.clone()
    }
}

// ---------------------------------------------------------------------------
// Publisher

#[derive(Debug, Clone)]
pub struct Published {
    pub info: ServiceInfo,
    pub signature: String,
}

#[derive(Default)]
struct PublishState {
    successes: Vec<Published>,
    failures: Vec<PublishStatus>,
    unpublished: u32,
    clat46_unpublished: u32,
    ipv4_detached: u32,
    conflicts: Vec<Ipv6Addr>,
    symptoms: u32,
    busy: bool,
    published: bool,
    native_ipv4: bool,
}

#[derive(Clone, Default)]
pub struct FakePublisher(Rc<RefCell<PublishState>>);

impl FakePublisher {
    pub fn successes(&self) -> Vec<Published> {
        self.0.borrow().successes.clone()
    }

    pub fn last_success(&self) -> Option<Published> {
        self.0.borrow().successes.last().cloned()
    }

    pub fn failures(&self) -> Vec<PublishStatus> {
        self.0.borrow().failures.clone()
    }

    pub fn unpublished(&self) -> u32 {
        self.0.borrow().unpublished
    }

    pub fn clat46_unpublished(&self) -> u32 {
        self.0.borrow().clat46_unpublished
    }

    pub fn ipv4_detached(&self) -> u32 {
        self.0.borrow().ipv4_detached
    }

    pub fn conflicts(&self) -> Vec<Ipv6Addr> {
        self.0.borrow().conflicts.clone()
    }

    pub fn symptoms(&self) -> u32 {
        self.0.borrow().symptoms
    }

    pub fn busy(&self) -> bool {
        self.0.borrow().busy
    }

    pub fn set_native_ipv4(&self, native: bool) {
        self.0.borrow_mut().native_ipv4 = native;
    }
}

impl Publisher for FakePublisher {
    fn publish_success(&mut self, _ifname: &str, info: ServiceInfo, signature: &str) {
        let mut state = self.0.borrow_mut();
        state.published = true;
        state.successes.push(Published {
            info,
            signature: signature.to_string(),
        });
    }

    fn publish_failure(&mut self, _ifname: &str, status: PublishStatus) {
        let mut state = self.0.borrow_mut();
        state.published = false;
        state.failures.push(status);
    }

    fn unpublish(&mut self, _ifname: &str) {
        let mut state = self.0.borrow_mut();
        state.published = false;
        state.unpublished += 1;
    }

    fn unpublish_clat46(&mut self, _ifname: &str) {
        self.0.borrow_mut().clat46_unpublished += 1;
    }

    fn detach_ipv4(&mut self, _ifname: &str) {
        self.0.borrow_mut().ipv4_detached += 1;
    }

    fn report_address_conflict(&mut self, _ifname: &str, addr: Ipv6Addr) {
        self.0.borrow_mut().conflicts.push(addr);
    }

    fn generate_failure_symptom(&mut self, _ifname: &str) {
        self.0.borrow_mut().symptoms += 1;
    }

    fn is_published(&self, _ifname: &str) -> bool {
        self.0.borrow().published
    }

    fn is_busy(&self, _ifname: &str) -> bool {
        self.0.borrow().busy
    }

    fn set_busy(&mut self, _ifname: &str, busy: bool) {
        self.0.borrow_mut().busy = busy;
    }

    fn has_native_ipv4(&self, _ifname: &str) -> bool {
        self.0.borrow().native_ipv4
    }
}

// ---------------------------------------------------------------------------
// Reports and PvD

#[derive(Clone, Default)]
pub struct FakeReports(Rc<RefCell<Vec<RtadvReport>>>);

impl FakeReports {
    pub fn all(&self) -> Vec<RtadvReport> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> Option<RtadvReport> {
        self.0.borrow().last().cloned()
    }
}

impl ReportSink for FakeReports {
    fn submit(&mut self, report: RtadvReport) {
        self.0.borrow_mut().push(report);
    }
}

#[derive(Default)]
struct PvdState {
    requests: Vec<(PvdRequestId, PvdRequest)>,
    cancelled: Vec<PvdRequestId>,
    fail_next: bool,
}

#[derive(Clone, Default)]
pub struct FakePvdFetcher(Rc<RefCell<PvdState>>);

impl FakePvdFetcher {
    pub fn requests(&self) -> Vec<(PvdRequestId, PvdRequest)> {
        self.0.borrow().requests.clone()
    }

    pub fn cancelled(&self) -> Vec<PvdRequestId> {
        self.0.borrow().cancelled.clone()
    }

    pub fn fail_next(&self) {
        self.0.borrow_mut().fail_next = true;
    }
}

impl PvdFetcher for FakePvdFetcher {
    fn fetch(&mut self, id: PvdRequestId, request: PvdRequest, _notifier: InterfaceNotifier) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if std::mem::take(&mut state.fail_next) {
            return Err(Error::AllocationFailed("PvD fetch".into()));
        }
        state.requests.push((id, request));
        Ok(())
    }

    fn cancel(&mut self, id: PvdRequestId) {
        self.0.borrow_mut().cancelled.push(id);
    }
}

// ---------------------------------------------------------------------------
// Harness

/// Everything a single interface's state machine talks to
pub struct Harness {
    pub now: Instant,
    pub utc_now: DateTime<Utc>,
    pub config: RtadvConfig,
    pub metrics: Arc<RtadvMetrics>,
    pub net: FakeNet,
    pub sockets: RtadvSocketManager,
    pub clat46: Clat46AddressPool,
    pub interfaces: FakeInterfaces,
    pub dhcpv6: FakeDhcpv6,
    pub publisher: FakePublisher,
    pub reports: FakeReports,
    pub pvd: FakePvdFetcher,
    pub rng: StdRng,
    pub tx: EventSender,
    pub rx: EventReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let config = RtadvConfig::default();
        let metrics = Arc::new(RtadvMetrics::new());
        let net = FakeNet::default();
        let sockets = RtadvSocketManager::new(
            Box::new(net.factory()),
            config.socket.close_delay(),
            metrics.clone(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            now: Instant::now(),
            utc_now: Utc::now(),
            config,
            metrics,
            net,
            sockets,
            clat46: Clat46AddressPool::new(),
            interfaces: FakeInterfaces::default(),
            dhcpv6: FakeDhcpv6::default(),
            publisher: FakePublisher::default(),
            reports: FakeReports::default(),
            pvd: FakePvdFetcher::default(),
            rng: StdRng::seed_from_u64(4861),
            tx,
            rx,
        }
    }

    pub fn env(&mut self) -> RtadvEnv<'_> {
        RtadvEnv {
            now: self.now,
            utc_now: self.utc_now,
            config: &self.config,
            metrics: &self.metrics,
            sockets: &mut self.sockets,
            clat46: &mut self.clat46,
            interfaces: &mut self.interfaces,
            dhcpv6: &mut self.dhcpv6,
            publisher: &mut self.publisher,
            reports: &mut self.reports,
            pvd: &mut self.pvd,
            rng: &mut self.rng,
            events: &self.tx,
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
        self.utc_now += chrono::Duration::milliseconds(by.as_millis() as i64);
    }

    pub fn advance_to(&mut self, deadline: Instant) {
        if deadline > self.now {
            self.advance(deadline - self.now);
        }
    }

    /// Interface events posted so far
    pub fn drain_events(&mut self) -> Vec<(u32, RtadvEvent)> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if let super::event::DaemonEvent::Interface { if_index, event } = event {
                events.push((if_index, event));
            }
        }
        events
    }
}
