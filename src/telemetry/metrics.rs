//! Router discovery counters.
//!
//! Atomic counters tracked globally (multiplexer drops) and per interface
//! (solicitations, accepted/rejected RAs, restarts, PvD fetches).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-interface router discovery statistics.
#[derive(Debug, Default)]
pub struct InterfaceStats {
    /// Router Solicitations sent.
    pub solicitations_sent: Counter,
    /// Router Solicitation send failures.
    pub send_errors: Counter,
    /// RAs delivered to the state machine.
    pub ra_received: Counter,
    /// RAs delivered but not accepted as current.
    pub ra_rejected: Counter,
    /// Transitions into Restart.
    pub restarts: Counter,
    /// PvD additional-information fetches issued.
    pub pvd_fetches: Counter,
}

impl InterfaceStats {
    /// Creates new interface statistics initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Which per-interface counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceCounter {
    SolicitationSent,
    SendError,
    RaReceived,
    RaRejected,
    Restart,
    PvdFetch,
}

/// Metrics registry shared by the multiplexer and the state machines.
#[derive(Debug, Default)]
pub struct RtadvMetrics {
    /// Per-interface statistics.
    interfaces: RwLock<HashMap<String, InterfaceStats>>,

    /// Datagrams read from the shared descriptor.
    pub datagrams_received: Counter,
    /// Datagrams dropped by the multiplexer's sanity checks.
    pub datagrams_dropped: Counter,
    /// Datagrams for an interface with no registration or callback.
    pub datagrams_unclaimed: Counter,
    /// Times the shared descriptor was opened.
    pub socket_opens: Counter,
    /// Times the shared descriptor was closed.
    pub socket_closes: Counter,
}

impl RtadvMetrics {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, InterfaceStats>> {
        self.interfaces.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, InterfaceStats>> {
        self.interfaces.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers an interface for statistics tracking.
    pub fn register_interface(&self, name: &str) {
        self.write().entry(name.to_string()).or_default();
    }

    /// Records one event on an interface.
    pub fn record(&self, interface: &str, counter: InterfaceCounter) {
        if let Some(stats) = self.read().get(interface) {
            let c = match counter {
                InterfaceCounter::SolicitationSent => &stats.solicitations_sent,
                InterfaceCounter::SendError => &stats.send_errors,
                InterfaceCounter::RaReceived => &stats.ra_received,
                InterfaceCounter::RaRejected => &stats.ra_rejected,
                InterfaceCounter::Restart => &stats.restarts,
                InterfaceCounter::PvdFetch => &stats.pvd_fetches,
            };
            c.inc();
        }
    }

    /// Reads one per-interface counter, 0 for unknown interfaces.
    pub fn get(&self, interface: &str, counter: InterfaceCounter) -> u64 {
        self.read().get(interface).map_or(0, |stats| match counter {
            InterfaceCounter::SolicitationSent => stats.solicitations_sent.get(),
            InterfaceCounter::SendError => stats.send_errors.get(),
            InterfaceCounter::RaReceived => stats.ra_received.get(),
            InterfaceCounter::RaRejected => stats.ra_rejected.get(),
            InterfaceCounter::Restart => stats.restarts.get(),
            InterfaceCounter::PvdFetch => stats.pvd_fetches.get(),
        })
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("datagrams_received".into(), self.datagrams_received.get()),
            ("datagrams_dropped".into(), self.datagrams_dropped.get()),
            ("datagrams_unclaimed".into(), self.datagrams_unclaimed.get()),
            ("socket_opens".into(), self.socket_opens.get()),
            ("socket_closes".into(), self.socket_closes.get()),
        ];

        for (name, stats) in self.read().iter() {
            result.extend([
                (
                    format!("{}_solicitations_sent", name),
                    stats.solicitations_sent.get(),
                ),
                (format!("{}_send_errors", name), stats.send_errors.get()),
                (format!("{}_ra_received", name), stats.ra_received.get()),
                (format!("{}_ra_rejected", name), stats.ra_rejected.get()),
                (format!("{}_restarts", name), stats.restarts.get()),
                (format!("{}_pvd_fetches", name), stats.pvd_fetches.get()),
            ]);
        }

        result
    }
}
