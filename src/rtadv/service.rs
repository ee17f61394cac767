//! Per-interface router discovery state machine
//!
//! One [`RtadvService`] runs on each IPv6 interface. It solicits routers,
//! accepts Router Advertisements from a single router, drives DHCPv6,
//! CLAT46 and PvD fetches off the RA, and publishes the resulting
//! configuration. Everything is driven by events and timers; the caller
//! supplies the current time and the collaborators through [`RtadvEnv`].

use super::address::{self, CollectedAddresses};
use super::clat46::Clat46AddressPool;
use super::dhcpv6::{Dhcpv6Client, Dhcpv6ClientFactory, Dhcpv6Mode};
use super::event::{EventSender, InterfaceNotifier, RtadvEvent};
use super::interface::{InterfaceInfo, InterfaceLayer, Ipv4AddressConfig, Ipv6AddressInfo, LinkType};
use super::publish::{self, Ipv4SyntheticConfig, PublishStatus, Publisher, ServiceInfo};
use super::pvd::{PvdDecision, PvdFetchOutcome, PvdFetcher, PvdInfoContext, PvdRequestId};
use super::socket::{RtadvSocketHandle, RtadvSocketManager};
use super::timer::{earliest, TimerCallout};
use crate::config::RtadvConfig;
use crate::protocol::ndp::{RouterAdvertisement, MAX_ROUTER_LIFETIME};
use crate::protocol::Ipv6Prefix;
use crate::telemetry::{InterfaceCounter, ReportSink, RtadvMetrics, RtadvReport};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// CLAT46 addresses are installed as host routes
pub const CLAT46_NETMASK: Ipv4Addr = Ipv4Addr::BROADCAST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtadvState {
    Inactive,
    Solicit,
    Acquired,
    Restart,
}

/// Everything a state machine touches outside itself
pub struct RtadvEnv<'a> {
    pub now: Instant,
    /// Wall clock, for PvD expiry timestamps
    pub utc_now: DateTime<Utc>,
    pub config: &'a RtadvConfig,
    pub metrics: &'a RtadvMetrics,
    pub sockets: &'a mut RtadvSocketManager,
    pub clat46: &'a mut Clat46AddressPool,
    pub interfaces: &'a mut dyn InterfaceLayer,
    pub dhcpv6: &'a mut dyn Dhcpv6ClientFactory,
    pub publisher: &'a mut dyn Publisher,
    pub reports: &'a mut dyn ReportSink,
    pub pvd: &'a mut dyn PvdFetcher,
    pub rng: &'a mut dyn RngCore,
    pub events: &'a EventSender,
}

#[derive(Debug, Default, Clone, Copy)]
struct RtadvFlags {
    /// Link-local address passed DAD; solicitations may carry SLLA
    lladdr_ok: bool,
    renew: bool,
    success_report_submitted: bool,
    acquisition_failed: bool,
    router_lifetime_zero: bool,
    has_autoconf_address: bool,
    autoconf_deprecated: bool,
    autoconf_detached: bool,
    link_local_duplicated: bool,
    /// CLAT46 was configured at some point since start
    clat46_used: bool,
}

pub struct RtadvService {
    interface: InterfaceInfo,
    state: RtadvState,
    try_count: u32,
    restart_count: u32,
    start_time: Option<Instant>,
    dhcpv6_complete_time: Option<Instant>,
    ra: Option<Arc<RouterAdvertisement>>,
    flags: RtadvFlags,
    nat64_prefix: Option<Ipv6Prefix>,
    clat46_partial: Option<u8>,
    pvd: PvdInfoContext,
    solicit_timer: TimerCallout,
    restart_timer: TimerCallout,
    expiration_timer: TimerCallout,
    socket: Option<RtadvSocketHandle>,
    dhcpv6: Option<Box<dyn Dhcpv6Client>>,
    dhcpv6_mode: Option<Dhcpv6Mode>,
}

impl RtadvService {
    pub fn new(interface: InterfaceInfo) -> Self {
        let pvd = PvdInfoContext::new(&interface.name);
        Self {
            interface,
            state: RtadvState::Inactive,
            try_count: 0,
            restart_count: 0,
            start_time: None,
            dhcpv6_complete_time: None,
            ra: None,
            flags: RtadvFlags::default(),
            nat64_prefix: None,
            clat46_partial: None,
            pvd,
            solicit_timer: TimerCallout::new(),
            restart_timer: TimerCallout::new(),
            expiration_timer: TimerCallout::new(),
            socket: None,
            dhcpv6: None,
            dhcpv6_mode: None,
        }
    }

    pub fn interface(&self) -> &InterfaceInfo {
        &self.interface
    }

    pub fn state(&self) -> RtadvState {
        self.state
    }

    /// Solicitations sent since the last (re)initialization
    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn current_ra(&self) -> Option<&Arc<RouterAdvertisement>> {
        self.ra.as_ref()
    }

    pub fn clat46_partial(&self) -> Option<u8> {
        self.clat46_partial
    }

    pub fn nat64_prefix(&self) -> Option<Ipv6Prefix> {
        self.nat64_prefix
    }

    pub fn pvd(&self) -> &PvdInfoContext {
        &self.pvd
    }

    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.solicit_timer.deadline(),
            self.restart_timer.deadline(),
            self.expiration_timer.deadline(),
        ])
    }

    /// Register with the RA socket, create the DHCPv6 client and begin
    /// soliciting
    pub fn start(&mut self, env: &mut RtadvEnv<'_>) -> Result<()> {
        if self.is_running() {
            debug!(interface = %self.interface.name, "router discovery already running");
            return Ok(());
        }
        let name = self.interface.name.clone();

        if self.interface.link_type == LinkType::Loopback {
            warn!(interface = %name, "router discovery not supported on loopback");
            env.publisher
                .publish_failure(&name, PublishStatus::InvalidOperation);
            return Err(Error::UnsupportedInterface { name });
        }

        env.metrics.register_interface(&name);

        let handle = match env.sockets.create(&self.interface) {
            Ok(handle) => handle,
            Err(e) => {
                error!(interface = %name, error = %e, "RA socket registration failed");
                env.publisher.publish_failure(&name, PublishStatus::InternalError);
                return Err(Error::AllocationFailed(format!("RA socket: {}", e)));
            }
        };

        if env.config.dhcpv6.enabled {
            let notifier = self.notifier(env);
            match env.dhcpv6.create(&self.interface, notifier) {
                Ok(mut client) => {
                    client.set_privacy(env.config.dhcpv6.privacy_addresses);
                    self.dhcpv6 = Some(client);
                }
                Err(e) => {
                    error!(interface = %name, error = %e, "DHCPv6 client creation failed");
                    env.sockets.release(handle, env.now);
                    env.publisher.publish_failure(&name, PublishStatus::InternalError);
                    return Err(Error::AllocationFailed(format!("DHCPv6 client: {}", e)));
                }
            }
        }

        self.socket = Some(handle);
        self.restart_count = 0;
        self.flags = RtadvFlags::default();
        info!(interface = %name, link_type = ?self.interface.link_type, "starting router discovery");

        if let Err(e) = self.init(env) {
            error!(interface = %name, error = %e, "router discovery init failed");
            if let Some(handle) = self.socket.take() {
                env.sockets.release(handle, env.now);
            }
            self.dhcpv6 = None;
            self.state = RtadvState::Inactive;
            env.publisher.publish_failure(&name, PublishStatus::InternalError);
            return Err(Error::AllocationFailed(format!("RA receive: {}", e)));
        }
        Ok(())
    }

    /// Tear everything down; a no-op when not running
    pub fn stop(&mut self, env: &mut RtadvEnv<'_>) {
        let Some(handle) = self.socket.take() else {
            return;
        };
        let name = self.interface.name.clone();
        info!(interface = %name, "stopping router discovery");

        self.cancel_timers();
        env.sockets.release(handle, env.now);
        if let Some(mut client) = self.dhcpv6.take() {
            client.stop();
        }
        self.dhcpv6_mode = None;
        self.dhcpv6_complete_time = None;
        self.pvd.flush(env.pvd);
        self.teardown_nat64(env, true);
        if let Err(e) = env.interfaces.set_ra_acceptance(&name, false) {
            warn!(interface = %name, error = %e, "failed to disable RA acceptance");
        }
        self.flush_routes(env);
        env.publisher.unpublish(&name);

        self.ra = None;
        self.try_count = 0;
        self.flags = RtadvFlags::default();
        self.state = RtadvState::Inactive;
    }

    pub fn handle_event(&mut self, event: RtadvEvent, env: &mut RtadvEnv<'_>) {
        if !self.is_running() {
            debug!(interface = %self.interface.name, ?event, "ignoring event, not running");
            return;
        }

        match event {
            RtadvEvent::RouterAdvertisement(ra) => self.router_advertisement(ra, env),
            RtadvEvent::LinkStatusChanged => self.link_status_changed(env),
            RtadvEvent::AddressChanged => self.address_changed(env),
            RtadvEvent::Dhcpv6StatusChanged => self.dhcpv6_status_changed(env),
            RtadvEvent::Dhcpv6Symptom => {
                env.publisher.generate_failure_symptom(&self.interface.name);
            }
            RtadvEvent::Renew => self.renew(env),
            RtadvEvent::NetworkChanged => self.network_changed(env),
            RtadvEvent::Wake => self.wake(env),
            RtadvEvent::RouterExpired => self.router_expired(env),
            RtadvEvent::PvdFetchComplete { request, outcome } => {
                self.pvd_fetch_complete(request, outcome, env)
            }
        }
    }

    /// Run whichever timers are due at `env.now`
    pub fn poll_timers(&mut self, env: &mut RtadvEnv<'_>) {
        let now = env.now;
        if self.solicit_timer.fire_if_due(now) && self.state == RtadvState::Solicit {
            self.solicit(env);
        }
        if self.restart_timer.fire_if_due(now) && self.state == RtadvState::Restart {
            self.reinit(env);
        }
        if self.expiration_timer.fire_if_due(now) && self.state == RtadvState::Acquired {
            self.expiration_fired(env);
        }
    }

    fn notifier(&self, env: &RtadvEnv<'_>) -> InterfaceNotifier {
        InterfaceNotifier::new(self.interface.index, env.events.clone())
    }

    fn cancel_timers(&mut self) {
        self.solicit_timer.cancel();
        self.restart_timer.cancel();
        self.expiration_timer.cancel();
    }

    fn init(&mut self, env: &mut RtadvEnv<'_>) -> Result<()> {
        let name = self.interface.name.clone();
        self.cancel_timers();
        self.ra = None;
        self.try_count = 0;
        self.start_time = Some(env.now);
        self.flags.acquisition_failed = false;
        self.flags.router_lifetime_zero = false;
        self.flags.success_report_submitted = false;
        self.flags.link_local_duplicated = false;

        let notifier = self.notifier(env);
        let Some(handle) = self.socket.as_ref() else {
            return Err(Error::NotRegistered {
                if_index: self.interface.index,
            });
        };
        env.sockets.enable_receive(
            handle,
            Box::new(move |ra| notifier.post(RtadvEvent::RouterAdvertisement(ra))),
        )?;

        let ready_link_local = env
            .interfaces
            .ipv6_addresses(&name)
            .ok()
            .and_then(|addrs| addrs.into_iter().find(|a| a.is_link_local() && a.is_ready()));
        self.flags.lladdr_ok = ready_link_local.is_some();
        env.sockets
            .set_link_local(handle, ready_link_local.map(|a| a.addr));

        if let Err(e) = env.interfaces.set_ra_acceptance(&name, true) {
            warn!(interface = %name, error = %e, "failed to enable RA acceptance");
        }
        env.publisher.set_busy(&name, true);
        self.state = RtadvState::Solicit;

        if env.interfaces.link_status(&name).is_up() {
            self.solicit(env);
        } else {
            debug!(interface = %name, "link inactive, waiting before soliciting");
        }
        Ok(())
    }

    /// Re-initialize after a restart delay or a link transition
    fn reinit(&mut self, env: &mut RtadvEnv<'_>) {
        if let Err(e) = self.init(env) {
            let name = self.interface.name.clone();
            error!(interface = %name, error = %e, "router discovery re-init failed");
            self.cancel_timers();
            self.state = RtadvState::Inactive;
            env.publisher.publish_failure(&name, PublishStatus::InternalError);
        }
    }

    fn solicit(&mut self, env: &mut RtadvEnv<'_>) {
        let config: &RtadvConfig = env.config;
        let config = &config.solicitation;
        if self.try_count >= config.max_solicitations {
            self.acquisition_failed(env);
            return;
        }
        let Some(handle) = self.socket.as_ref() else {
            return;
        };

        self.try_count += 1;
        let name = &self.interface.name;
        match env.sockets.send_solicitation(handle, self.flags.lladdr_ok) {
            Ok(()) => {
                env.metrics.record(name, InterfaceCounter::SolicitationSent);
                debug!(interface = %name, attempt = self.try_count, "Router Solicitation sent");
            }
            Err(e) if e.is_transient() => {
                env.metrics.record(name, InterfaceCounter::SendError);
                debug!(interface = %name, error = %e, "Router Solicitation not sent, will retry");
            }
            Err(e) => {
                env.metrics.record(name, InterfaceCounter::SendError);
                error!(interface = %name, error = %e, "Router Solicitation send failed");
            }
        }

        if self.try_count >= config.max_solicitations {
            self.solicit_timer
                .set_relative(env.now, config.acquisition_failure_timeout());
            return;
        }

        let jitter = if self.interface.is_cellular() || config.jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(env.rng.random_range(0..config.jitter_ms))
        };
        self.solicit_timer
            .set_relative(env.now, config.interval() + jitter);
    }

    /// No RA after the last solicitation; keep listening
    fn acquisition_failed(&mut self, env: &mut RtadvEnv<'_>) {
        if self.flags.acquisition_failed {
            return;
        }
        self.flags.acquisition_failed = true;
        let name = self.interface.name.clone();
        warn!(interface = %name, solicitations = self.try_count, "no Router Advertisement received");
        self.submit_report(env, false);
        env.publisher.generate_failure_symptom(&name);
        env.publisher.set_busy(&name, false);
    }

    fn router_advertisement(&mut self, ra: Arc<RouterAdvertisement>, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        env.metrics.record(&name, InterfaceCounter::RaReceived);

        match self.state {
            RtadvState::Inactive | RtadvState::Restart => {
                debug!(interface = %name, state = ?self.state, "ignoring Router Advertisement");
            }
            RtadvState::Solicit => {
                if ra.router_lifetime() == 0 {
                    self.flags.router_lifetime_zero = true;
                    env.metrics.record(&name, InterfaceCounter::RaRejected);
                    debug!(interface = %name, router = %ra.source(), "ignoring RA with zero router lifetime");
                    return;
                }
                info!(
                    interface = %name,
                    router = %ra.source(),
                    lifetime = ra.router_lifetime(),
                    "router discovered"
                );
                self.solicit_timer.cancel();
                self.state = RtadvState::Acquired;
                self.accept(ra, env);
            }
            RtadvState::Acquired => {
                match &self.ra {
                    Some(current) if current.source() != ra.source() => {
                        env.metrics.record(&name, InterfaceCounter::RaRejected);
                        debug!(
                            interface = %name,
                            router = %ra.source(),
                            current = %current.source(),
                            "ignoring RA from another router"
                        );
                        return;
                    }
                    None if ra.router_lifetime() == 0 => {
                        self.flags.router_lifetime_zero = true;
                        env.metrics.record(&name, InterfaceCounter::RaRejected);
                        debug!(interface = %name, router = %ra.source(), "ignoring RA with zero router lifetime");
                        return;
                    }
                    _ => {}
                }
                self.accept(ra, env);
            }
        }
    }

    fn accept(&mut self, ra: Arc<RouterAdvertisement>, env: &mut RtadvEnv<'_>) {
        self.expiration_timer.cancel();
        if ra.router_lifetime() == 0 {
            info!(interface = %self.interface.name, router = %ra.source(), "router lifetime zero, dropping router");
            self.flags.router_lifetime_zero = true;
            self.ra = None;
        } else {
            self.ra = Some(ra);
        }

        self.update_dhcpv6();
        self.address_changed(env);
        if self.state != RtadvState::Acquired {
            return;
        }
        self.evaluate_pvd(env);
        self.arm_expiration(env);
    }

    /// Start, switch or stop DHCPv6 to match the current RA's M/O flags
    fn update_dhcpv6(&mut self) {
        let wanted = self
            .ra
            .as_ref()
            .and_then(|ra| Dhcpv6Mode::from_ra_flags(ra.flags()));
        let Some(client) = self.dhcpv6.as_mut() else {
            return;
        };

        match wanted {
            Some(mode) if self.dhcpv6_mode != Some(mode) || !client.is_active() => {
                info!(interface = %self.interface.name, ?mode, "starting DHCPv6");
                client.set_mode(mode);
                client.start();
                self.dhcpv6_mode = Some(mode);
                self.dhcpv6_complete_time = None;
            }
            Some(_) => {}
            None => {
                if client.is_active() {
                    info!(interface = %self.interface.name, "stopping DHCPv6");
                    client.stop();
                }
                self.dhcpv6_mode = None;
                self.dhcpv6_complete_time = None;
            }
        }
    }

    fn stop_dhcpv6(&mut self) {
        if let Some(client) = self.dhcpv6.as_mut() {
            if client.is_active() {
                client.stop();
            }
        }
        self.dhcpv6_mode = None;
        self.dhcpv6_complete_time = None;
    }

    /// Re-examine the interface's addresses and publish what is usable
    fn address_changed(&mut self, env: &mut RtadvEnv<'_>) {
        if matches!(self.state, RtadvState::Inactive | RtadvState::Restart) {
            return;
        }
        let name = self.interface.name.clone();

        let addresses = match env.interfaces.ipv6_addresses(&name) {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(interface = %name, error = %e, "failed to read IPv6 addresses");
                return;
            }
        };
        if !self.check_link_local(&addresses, env) {
            return;
        }

        if self.state == RtadvState::Solicit {
            if self.try_count == 0 && env.interfaces.link_status(&name).is_up() {
                self.solicit(env);
            }
            return;
        }

        let collected = address::collect(&name, &addresses);
        self.flags.autoconf_deprecated = collected.deprecated > 0;
        self.flags.autoconf_detached = collected.detached > 0;

        if collected.autoconf.is_empty() && self.flags.has_autoconf_address {
            info!(interface = %name, "autoconf addresses gone");
            self.restart(env);
            return;
        }
        self.flags.has_autoconf_address = !collected.autoconf.is_empty();

        if collected.is_empty() {
            debug!(interface = %name, "no usable addresses yet");
            return;
        }

        let ipv4 = self.update_clat46(env);
        self.publish(env, &collected, ipv4);
    }

    /// Returns true once a link-local address is usable
    fn check_link_local(&mut self, addresses: &[Ipv6AddressInfo], env: &mut RtadvEnv<'_>) -> bool {
        let name = self.interface.name.clone();
        let Some(link_local) = addresses.iter().find(|a| a.is_link_local()) else {
            debug!(interface = %name, "no link-local address yet");
            return false;
        };

        if link_local.duplicated {
            error!(interface = %name, address = %link_local.addr, "duplicate link-local address");
            self.flags.link_local_duplicated = true;
            self.flags.lladdr_ok = false;
            env.publisher.report_address_conflict(&name, link_local.addr);
            if let Err(e) = env.interfaces.remove_ipv6_address(&name, link_local.addr) {
                warn!(interface = %name, error = %e, "failed to remove duplicate address");
            }
            env.publisher.publish_failure(&name, PublishStatus::AddressInUse);
            return false;
        }

        if link_local.tentative {
            debug!(interface = %name, address = %link_local.addr, "link-local address tentative");
            self.flags.lladdr_ok = false;
            return false;
        }

        self.flags.lladdr_ok = true;
        if let Some(handle) = self.socket.as_ref() {
            env.sockets.set_link_local(handle, Some(link_local.addr));
        }
        true
    }

    /// Bring CLAT46 and the NAT64 prefix in line with the current RA
    fn update_clat46(&mut self, env: &mut RtadvEnv<'_>) -> Option<Ipv4SyntheticConfig> {
        let name = self.interface.name.clone();
        let pref64 = self
            .ra
            .as_ref()
            .and_then(|ra| ra.active_pref64(env.now))
            .map(|p| p.prefix);
        let nat64 = pref64.or_else(|| env.interfaces.discovered_nat64_prefix(&name));

        match nat64 {
            Some(prefix) if env.config.clat46.enabled && !env.publisher.has_native_ipv4(&name) => {
                Some(self.configure_clat46(env, prefix))
            }
            _ => {
                let was_used = self.clat46_partial.is_some() || self.flags.clat46_used;
                self.teardown_nat64(env, false);
                if pref64.is_none() && (was_used || !self.interface.is_cellular()) {
                    if let Err(e) = env.interfaces.start_plat_discovery(&name) {
                        warn!(interface = %name, error = %e, "PLAT discovery failed to start");
                    }
                }
                None
            }
        }
    }

    fn configure_clat46(&mut self, env: &mut RtadvEnv<'_>, prefix: Ipv6Prefix) -> Ipv4SyntheticConfig {
        let name = self.interface.name.clone();
        if self.nat64_prefix != Some(prefix) {
            info!(interface = %name, %prefix, "installing NAT64 prefix");
            if let Err(e) = env.interfaces.set_nat64_prefixes(&name, &[prefix]) {
                warn!(interface = %name, error = %e, "failed to set NAT64 prefix");
            }
            self.nat64_prefix = Some(prefix);
        }

        let partial = match self.clat46_partial {
            Some(partial) => partial,
            None => {
                let partial = env.clat46.allocate(&name);
                self.clat46_partial = Some(partial);
                self.flags.clat46_used = true;
                let config = Ipv4AddressConfig {
                    addr: Clat46AddressPool::address(partial),
                    netmask: CLAT46_NETMASK,
                    broadcast: None,
                };
                if let Err(e) = env.interfaces.set_clat46(&name, true) {
                    warn!(interface = %name, error = %e, "failed to enable CLAT46");
                }
                if let Err(e) = env.interfaces.set_ipv4_address(&name, config) {
                    warn!(interface = %name, error = %e, "failed to set CLAT46 address");
                }
                if let Err(e) = env.interfaces.set_arp_suppression(&name, true) {
                    warn!(interface = %name, error = %e, "failed to suppress ARP");
                }
                partial
            }
        };

        Ipv4SyntheticConfig {
            address: Clat46AddressPool::address(partial),
            netmask: CLAT46_NETMASK,
            nat64_prefix: prefix,
        }
    }

    /// Remove the NAT64 prefix and CLAT46 address. `detach` withdraws the
    /// synthesized IPv4 service entirely instead of just its CLAT46 part.
    fn teardown_nat64(&mut self, env: &mut RtadvEnv<'_>, detach: bool) {
        let name = self.interface.name.clone();
        if self.nat64_prefix.take().is_some() {
            if let Err(e) = env.interfaces.remove_nat64_prefixes(&name) {
                warn!(interface = %name, error = %e, "failed to remove NAT64 prefix");
            }
        }

        let Some(partial) = self.clat46_partial.take() else {
            return;
        };
        info!(interface = %name, "removing CLAT46 configuration");
        if let Err(e) = env
            .interfaces
            .remove_ipv4_address(&name, Clat46AddressPool::address(partial))
        {
            warn!(interface = %name, error = %e, "failed to remove CLAT46 address");
        }
        if let Err(e) = env.interfaces.set_arp_suppression(&name, false) {
            warn!(interface = %name, error = %e, "failed to restore ARP");
        }
        if let Err(e) = env.interfaces.set_clat46(&name, false) {
            warn!(interface = %name, error = %e, "failed to disable CLAT46");
        }
        env.clat46.release(&name, partial);
        if detach {
            env.publisher.detach_ipv4(&name);
        } else {
            env.publisher.unpublish_clat46(&name);
        }
    }

    fn publish(
        &mut self,
        env: &mut RtadvEnv<'_>,
        collected: &CollectedAddresses,
        ipv4_synthetic: Option<Ipv4SyntheticConfig>,
    ) {
        let name = self.interface.name.clone();
        let Some(prefix) = collected.first_prefix() else {
            return;
        };
        let addresses = collected.all();

        if self.flags.renew {
            self.flags.renew = false;
            debug!(interface = %name, count = addresses.len(), "reasserting addresses");
            if let Err(e) = env.interfaces.reassert_ipv6_addresses(&name, &addresses) {
                warn!(interface = %name, error = %e, "failed to reassert addresses");
            }
        }

        let now = env.now;
        let mut info = ServiceInfo {
            addresses,
            routers: Vec::new(),
            dns_servers: Vec::new(),
            dns_domains: Vec::new(),
            mtu: None,
            pvd_id: None,
            pvd_additional_info: self.pvd.additional_info().cloned(),
            ipv4_synthetic,
        };
        let mut router_hw_addr = None;
        if let Some(ra) = &self.ra {
            info.routers.push(ra.source());
            info.dns_servers.extend_from_slice(ra.dns_servers(now));
            info.dns_domains.extend(ra.dns_domains(now).iter().cloned());
            info.mtu = ra.mtu();
            info.pvd_id = ra.pvd().map(|p| p.id.clone());
            router_hw_addr = ra.source_link_addr();
        }

        let dhcpv6_active = match self.dhcpv6.as_ref().filter(|c| c.is_active()) {
            Some(client) => {
                let leased = client.info();
                for server in leased.dns_servers {
                    if !info.dns_servers.contains(&server) {
                        info.dns_servers.push(server);
                    }
                }
                for domain in leased.dns_domains {
                    if !info.dns_domains.contains(&domain) {
                        info.dns_domains.push(domain);
                    }
                }
                true
            }
            None => false,
        };

        let signature = publish::signature(prefix, router_hw_addr);
        debug!(
            interface = %name,
            %signature,
            addresses = info.addresses.len(),
            dns_servers = info.dns_servers.len(),
            clat46 = info.ipv4_synthetic.is_some(),
            "publishing IPv6 configuration"
        );
        env.publisher.publish_success(&name, info, &signature);
        env.publisher.set_busy(&name, false);

        if !self.flags.success_report_submitted && (!dhcpv6_active || self.dhcpv6_complete_time.is_some()) {
            self.submit_report(env, true);
            self.flags.success_report_submitted = true;
        }
    }

    fn submit_report(&self, env: &mut RtadvEnv<'_>, success: bool) {
        let mut report = RtadvReport::new(&self.interface.name, self.interface.link_type.into(), success);
        report.solicitations = self.try_count;
        report.elapsed_ms = self
            .start_time
            .map(|t| env.now.saturating_duration_since(t).as_millis() as u64)
            .unwrap_or(0);
        report.restarts = self.restart_count;
        report.link_local_duplicated = self.flags.link_local_duplicated;
        report.autoconf_address_acquired = self.flags.has_autoconf_address;
        report.autoconf_address_deprecated = self.flags.autoconf_deprecated;
        report.autoconf_address_detached = self.flags.autoconf_detached;
        report.router_lifetime_zero = self.flags.router_lifetime_zero;

        if let Some(ra) = &self.ra {
            let flags = ra.flags();
            report.router_lifetime = Some(ra.router_lifetime());
            report.router_lifetime_infinite = ra.router_lifetime() == MAX_ROUTER_LIFETIME;
            report.managed_flag = flags.managed;
            report.other_flag = flags.other;
            report.rdnss_acquired = ra.rdnss().is_some();
            report.dnssl_acquired = ra.dnssl().is_some();
            report.pref64_advertised = ra.pref64().is_some();
            report.pvd_advertised = ra.pvd().is_some();
        }
        if let Some(client) = &self.dhcpv6 {
            report.dhcpv6_active = client.is_active();
            report.dhcpv6_address_acquired = client.has_addresses();
            report.dhcpv6_dns_acquired = client.has_dns();
        }
        report.clat46_configured = self.clat46_partial.is_some();
        report.pvd_additional_info = self.pvd.additional_info().is_some();

        env.reports.submit(report);
    }

    fn flush_routes(&mut self, env: &mut RtadvEnv<'_>) {
        if let Err(e) = env.interfaces.flush_prefixes_and_routes(&self.interface.name) {
            warn!(interface = %self.interface.name, error = %e, "failed to flush prefixes and routes");
        }
    }

    /// Drop the router and configuration, then solicit again after a
    /// random delay
    fn restart(&mut self, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        info!(interface = %name, restarts = self.restart_count + 1, "restarting router discovery");

        self.submit_report(env, false);
        if env.publisher.is_published(&name) {
            env.publisher
                .publish_failure(&name, PublishStatus::ResourceUnavailable);
        }

        self.cancel_timers();
        self.ra = None;
        self.teardown_nat64(env, false);
        self.stop_dhcpv6();
        self.flush_routes(env);
        self.flags.has_autoconf_address = false;

        self.restart_count += 1;
        env.metrics.record(&name, InterfaceCounter::Restart);
        self.state = RtadvState::Restart;

        let max_delay = env.config.restart.max_delay_ms;
        let delay = Duration::from_millis(env.rng.random_range(0..=max_delay));
        debug!(interface = %name, delay_ms = delay.as_millis() as u64, "restart scheduled");
        self.restart_timer.set_relative(env.now, delay);
    }

    fn router_expired(&mut self, env: &mut RtadvEnv<'_>) {
        if self.state != RtadvState::Acquired {
            return;
        }
        let name = self.interface.name.clone();
        let remaining = env.interfaces.router_count(self.interface.index);
        if remaining == 0 {
            info!(interface = %name, "router expired, none left");
            self.restart(env);
            return;
        }

        info!(interface = %name, remaining, "router expired, soliciting");
        self.submit_report(env, false);
        self.cancel_timers();
        self.ra = None;
        self.try_count = 0;
        self.flags.acquisition_failed = false;
        self.state = RtadvState::Solicit;
        self.solicit(env);
    }

    fn link_status_changed(&mut self, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        if !env.interfaces.link_status(&name).is_up() {
            if self.state != RtadvState::Inactive {
                self.link_inactive(env);
            }
            return;
        }

        if self.state == RtadvState::Inactive {
            info!(interface = %name, "link active");
            self.reinit(env);
        } else {
            self.address_changed(env);
        }
    }

    fn link_inactive(&mut self, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        info!(interface = %name, "link inactive");

        self.cancel_timers();
        self.ra = None;
        self.teardown_nat64(env, true);
        self.stop_dhcpv6();
        self.flush_routes(env);
        if let Some(handle) = self.socket.as_ref() {
            env.sockets.disable_receive(handle, env.now);
        }
        env.publisher.publish_failure(&name, PublishStatus::MediaInactive);

        self.flags.has_autoconf_address = false;
        self.try_count = 0;
        self.state = RtadvState::Inactive;
    }

    fn network_changed(&mut self, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        self.pvd.flush(env.pvd);
        if self.state == RtadvState::Inactive {
            return;
        }

        info!(interface = %name, "network changed");
        env.publisher.publish_failure(&name, PublishStatus::NetworkChanged);
        self.cancel_timers();
        self.ra = None;
        self.teardown_nat64(env, true);
        self.stop_dhcpv6();
        self.flush_routes(env);
        self.flags.has_autoconf_address = false;
        self.reinit(env);
    }

    fn renew(&mut self, env: &mut RtadvEnv<'_>) {
        let name = self.interface.name.clone();
        if !env.interfaces.link_status(&name).is_up() {
            debug!(interface = %name, "renew ignored, link inactive");
            return;
        }
        info!(interface = %name, "renew requested");
        self.flags.renew = true;
        self.reinit(env);
    }

    fn wake(&mut self, env: &mut RtadvEnv<'_>) {
        if self.state == RtadvState::Inactive {
            return;
        }
        let name = self.interface.name.clone();
        if !env.interfaces.link_status(&name).is_up() {
            self.link_inactive(env);
            return;
        }

        let now = env.now;
        let dns_expired = self.ra.as_ref().is_some_and(|ra| ra.dns_expired(now));
        if dns_expired || self.pvd.is_expired(now) {
            info!(interface = %name, dns_expired, "configuration expired during sleep");
            self.reinit(env);
        } else if self.state == RtadvState::Acquired {
            self.arm_expiration(env);
        }
    }

    fn dhcpv6_status_changed(&mut self, env: &mut RtadvEnv<'_>) {
        let complete = self
            .dhcpv6
            .as_ref()
            .is_some_and(|c| c.is_active() && (c.has_addresses() || c.has_dns()));
        if complete && self.dhcpv6_complete_time.is_none() {
            debug!(interface = %self.interface.name, "DHCPv6 configuration complete");
            self.dhcpv6_complete_time = Some(env.now);
        }
        self.address_changed(env);
    }

    fn pvd_fetch_complete(
        &mut self,
        request: PvdRequestId,
        outcome: PvdFetchOutcome,
        env: &mut RtadvEnv<'_>,
    ) {
        let updated = self
            .pvd
            .complete(request, outcome, env.now, env.utc_now, &env.config.pvd);
        if updated && self.state == RtadvState::Acquired {
            self.address_changed(env);
            if self.state == RtadvState::Acquired {
                self.arm_expiration(env);
            }
        }
    }

    fn evaluate_pvd(&mut self, env: &mut RtadvEnv<'_>) {
        let notifier = self.notifier(env);
        let Some(ra) = &self.ra else {
            self.pvd.flush(env.pvd);
            return;
        };
        let decision = self.pvd.evaluate(
            ra,
            env.now,
            &mut *env.rng,
            &env.config.pvd,
            &mut *env.pvd,
            &notifier,
        );
        if let PvdDecision::Fetch { .. } = decision {
            env.metrics.record(&self.interface.name, InterfaceCounter::PvdFetch);
        }
    }

    /// Arm the expiration timer at the earliest DNS or PvD expiry
    fn arm_expiration(&mut self, env: &mut RtadvEnv<'_>) {
        let now = env.now;
        let dns = self
            .ra
            .as_ref()
            .and_then(|ra| ra.dns_expiration())
            .filter(|&t| t > now);
        let pvd = self.pvd.expiration().filter(|&t| t > now);

        match earliest([dns, pvd]) {
            Some(deadline) => self.expiration_timer.set_absolute(deadline),
            None => self.expiration_timer.cancel(),
        }
    }

    fn expiration_fired(&mut self, env: &mut RtadvEnv<'_>) {
        debug!(interface = %self.interface.name, "DNS/PvD expiration");
        if self.pvd.is_expired(env.now) {
            self.evaluate_pvd(env);
        }
        self.address_changed(env);
        if self.state == RtadvState::Acquired {
            self.arm_expiration(env);
        }
    }
}
