//! Run loop owning every interface's state machine
//!
//! All state machines, the shared RA socket and the CLAT46 pool live on
//! one task. Collaborators post back through the event channel; the loop
//! multiplexes that channel, socket readiness and the earliest timer.

use super::clat46::Clat46AddressPool;
use super::dhcpv6::Dhcpv6ClientFactory;
use super::event::{DaemonEvent, EventReceiver, EventSender, InterfaceNotifier, RtadvEvent};
use super::interface::{InterfaceInfo, InterfaceLayer};
use super::publish::Publisher;
use super::pvd::PvdFetcher;
use super::service::{RtadvEnv, RtadvService};
use super::socket::RtadvSocketManager;
use super::timer::earliest;
use crate::capture::Icmpv6SocketFactory;
use crate::config::RtadvConfig;
use crate::telemetry::{ReportSink, RtadvMetrics};
use crate::{Error, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Platform services the state machines drive
pub struct RtadvCollaborators {
    pub interfaces: Box<dyn InterfaceLayer>,
    pub dhcpv6: Box<dyn Dhcpv6ClientFactory>,
    pub publisher: Box<dyn Publisher>,
    pub reports: Box<dyn ReportSink>,
    pub pvd: Box<dyn PvdFetcher>,
}

enum Wakeup {
    Shutdown,
    Event(Option<DaemonEvent>),
    Readable,
    ReadError(io::Error),
    Timer,
}

pub struct RtadvDaemon {
    config: RtadvConfig,
    metrics: Arc<RtadvMetrics>,
    sockets: RtadvSocketManager,
    clat46: Clat46AddressPool,
    collaborators: RtadvCollaborators,
    rng: StdRng,
    services: HashMap<u32, RtadvService>,
    tx: EventSender,
    rx: EventReceiver,
}

impl RtadvDaemon {
    pub fn new(
        config: RtadvConfig,
        socket_factory: Box<dyn Icmpv6SocketFactory>,
        collaborators: RtadvCollaborators,
    ) -> Self {
        let metrics = Arc::new(RtadvMetrics::new());
        let sockets = RtadvSocketManager::new(socket_factory, config.socket.close_delay(), metrics.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            metrics,
            sockets,
            clat46: Clat46AddressPool::new(),
            collaborators,
            rng: StdRng::from_os_rng(),
            services: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Deterministic jitter and backoff
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn event_sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Queue an event for one interface; handled on the next loop turn
    pub fn post_event(&self, if_index: u32, event: RtadvEvent) {
        InterfaceNotifier::new(if_index, self.tx.clone()).post(event);
    }

    pub fn metrics(&self) -> Arc<RtadvMetrics> {
        self.metrics.clone()
    }

    pub fn sockets(&self) -> &RtadvSocketManager {
        &self.sockets
    }

    pub fn service(&self, if_index: u32) -> Option<&RtadvService> {
        self.services.get(&if_index)
    }

    pub fn interface_count(&self) -> usize {
        self.services.len()
    }

    /// Split borrows: the service table and an environment over the rest
    fn parts(&mut self, now: Instant) -> (&mut HashMap<u32, RtadvService>, RtadvEnv<'_>) {
        let Self {
            config,
            metrics,
            sockets,
            clat46,
            collaborators,
            rng,
            services,
            tx,
            ..
        } = self;
        let env = RtadvEnv {
            now,
            utc_now: Utc::now(),
            config,
            metrics: &**metrics,
            sockets,
            clat46,
            interfaces: collaborators.interfaces.as_mut(),
            dhcpv6: collaborators.dhcpv6.as_mut(),
            publisher: collaborators.publisher.as_mut(),
            reports: collaborators.reports.as_mut(),
            pvd: collaborators.pvd.as_mut(),
            rng,
            events: tx,
        };
        (services, env)
    }

    pub fn start_interface(&mut self, interface: InterfaceInfo, now: Instant) -> Result<()> {
        if self.services.contains_key(&interface.index) {
            debug!(interface = %interface.name, "router discovery already started");
            return Ok(());
        }
        let if_index = interface.index;
        let mut service = RtadvService::new(interface);
        let (services, mut env) = self.parts(now);
        service.start(&mut env)?;
        services.insert(if_index, service);
        Ok(())
    }

    pub fn stop_interface(&mut self, if_index: u32, now: Instant) -> Result<()> {
        let (services, mut env) = self.parts(now);
        let mut service = services
            .remove(&if_index)
            .ok_or(Error::NotRegistered { if_index })?;
        service.stop(&mut env);
        Ok(())
    }

    pub fn dispatch(&mut self, event: DaemonEvent, now: Instant) {
        match event {
            DaemonEvent::Start(interface) => {
                let name = interface.name.clone();
                if let Err(e) = self.start_interface(interface, now) {
                    warn!(interface = %name, error = %e, "failed to start router discovery");
                }
            }
            DaemonEvent::Stop { if_index } => {
                if let Err(e) = self.stop_interface(if_index, now) {
                    debug!(if_index, error = %e, "stop for unknown interface");
                }
            }
            DaemonEvent::Interface { if_index, event } => {
                let (services, mut env) = self.parts(now);
                match services.get_mut(&if_index) {
                    Some(service) => service.handle_event(event, &mut env),
                    None => debug!(if_index, ?event, "event for unknown interface"),
                }
            }
        }
    }

    /// Dispatch everything already queued; returns the number handled
    pub fn process_pending(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event, now);
            handled += 1;
        }
        handled
    }

    /// Read the RA socket and dispatch what it delivered
    pub fn handle_readable(&mut self, now: Instant) -> usize {
        let delivered = self.sockets.handle_readable(now);
        self.process_pending(now);
        delivered
    }

    pub fn poll_timers(&mut self, now: Instant) {
        self.sockets.poll_timers(now);
        let (services, mut env) = self.parts(now);
        for service in services.values_mut() {
            service.poll_timers(&mut env);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(
            std::iter::once(self.sockets.next_deadline())
                .chain(self.services.values().map(RtadvService::next_deadline)),
        )
    }

    /// Stop every interface
    pub fn shutdown(&mut self, now: Instant) {
        let (services, mut env) = self.parts(now);
        for (_, mut service) in services.drain() {
            service.stop(&mut env);
        }
    }

    /// Drive the state machines until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut readable: Option<(u64, AsyncFd<RawFd>)> = None;
        info!("router discovery daemon running");

        loop {
            let now = Instant::now();
            self.process_pending(now);
            self.poll_timers(now);

            let generation = self.sockets.generation();
            match self.sockets.raw_fd() {
                Some(fd) if readable.as_ref().map(|(g, _)| *g) != Some(generation) => {
                    // A reopened socket can reuse the fd number; deregister the
                    // old one before the new registration or it is lost.
                    drop(readable.take());
                    readable = Some((generation, AsyncFd::with_interest(fd, Interest::READABLE)?));
                }
                None => readable = None,
                Some(_) => {}
            }
            let deadline = self.next_deadline().map(tokio::time::Instant::from_std);

            let wakeup = tokio::select! {
                _ = &mut shutdown => Wakeup::Shutdown,
                event = self.rx.recv() => Wakeup::Event(event),
                result = wait_readable(readable.as_ref().map(|(_, fd)| fd)) => match result {
                    Ok(()) => Wakeup::Readable,
                    Err(e) => Wakeup::ReadError(e),
                },
                _ = sleep_until(deadline) => Wakeup::Timer,
            };

            let now = Instant::now();
            match wakeup {
                Wakeup::Shutdown => {
                    info!(interfaces = self.services.len(), "router discovery daemon stopping");
                    self.shutdown(now);
                    return Ok(());
                }
                Wakeup::Event(Some(event)) => self.dispatch(event, now),
                Wakeup::Event(None) => {}
                Wakeup::Readable => {
                    self.handle_readable(now);
                }
                Wakeup::ReadError(e) => {
                    warn!(error = %e, "RA socket readiness failed");
                    readable = None;
                }
                Wakeup::Timer => {}
            }
        }
    }
}

async fn wait_readable(fd: Option<&AsyncFd<RawFd>>) -> io::Result<()> {
    match fd {
        Some(fd) => {
            let mut guard = fd.readable().await?;
            // handle_readable drains until WouldBlock
            guard.clear_ready();
            Ok(())
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
