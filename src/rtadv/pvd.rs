//! PvD additional-information fetch scheduling (RFC 8801)
//!
//! The HTTPS fetch itself belongs to a [`PvdFetcher`]; this module decides
//! when to ask for one and tracks what came back.

use super::event::InterfaceNotifier;
use crate::config::PvdConfig;
use crate::protocol::ndp::RouterAdvertisement;
use crate::protocol::Ipv6Prefix;
use crate::Result;
use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Largest delay nibble honoured by the fetch backoff
const MAX_DELAY_EXPONENT: u8 = 4;

/// Identifies one fetch; completions carrying any other id are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PvdRequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvdRequest {
    pub pvd_id: String,
    pub prefixes: Vec<Ipv6Prefix>,
    pub ifname: String,
    /// Wait this long before issuing the HTTP request
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PvdFetchOutcome {
    /// Additional-information JSON object
    Success(Value),
    /// Transient: no route to the server yet
    NoConnectivity,
    /// Anything else; blocks fetching until the context is flushed
    Failed,
}

/// HTTPS fetcher for PvD additional information
pub trait PvdFetcher {
    /// Begin a fetch; the outcome is posted through `notifier` as
    /// `RtadvEvent::PvdFetchComplete` carrying `id`
    fn fetch(&mut self, id: PvdRequestId, request: PvdRequest, notifier: InterfaceNotifier) -> Result<()>;

    /// Best effort; a completion may still arrive afterwards
    fn cancel(&mut self, id: PvdRequestId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvdSkipReason {
    Disabled,
    /// A previous fetch for this PvD failed outright
    NotAllowed,
    InProgress,
    /// Within the minimum refetch window
    TooSoon,
    /// Same sequence number, information still fresh
    Unchanged,
    /// The fetcher refused the request
    CreateFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvdDecision {
    /// No usable PvD option; context flushed
    Deprecated,
    Fetch { id: PvdRequestId, delay: Duration },
    Skip(PvdSkipReason),
}

/// Randomized wait before fetching after a sequence-number change
pub fn fetch_backoff(delay: u8, rng: &mut dyn RngCore) -> Duration {
    let exponent = 10 + u32::from(delay.min(MAX_DELAY_EXPONENT));
    Duration::from_millis(rng.random_range(0..(1u64 << exponent)))
}

/// Per-interface PvD state
#[derive(Debug)]
pub struct PvdInfoContext {
    ifname: String,
    pvd_id: Option<String>,
    prefixes: Vec<Ipv6Prefix>,
    sequence: u16,
    ok: bool,
    fetch_failed: bool,
    additional_info: Option<Value>,
    last_fetch: Option<Instant>,
    expiration: Option<Instant>,
    outstanding: Option<PvdRequestId>,
    next_request: u64,
}

impl PvdInfoContext {
    pub fn new(ifname: &str) -> Self {
        Self {
            ifname: ifname.to_string(),
            pvd_id: None,
            prefixes: Vec::new(),
            sequence: 0,
            ok: false,
            fetch_failed: false,
            additional_info: None,
            last_fetch: None,
            expiration: None,
            outstanding: None,
            next_request: 1,
        }
    }

    pub fn pvd_id(&self) -> Option<&str> {
        self.pvd_id.as_deref()
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn fetch_failed(&self) -> bool {
        self.fetch_failed
    }

    pub fn outstanding(&self) -> Option<PvdRequestId> {
        self.outstanding
    }

    pub fn additional_info(&self) -> Option<&Value> {
        self.additional_info.as_ref()
    }

    /// Expiry of the stored additional information
    pub fn expiration(&self) -> Option<Instant> {
        if self.ok { self.expiration } else { None }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiration().is_some_and(|e| now >= e)
    }

    /// Forget everything, cancelling any outstanding fetch
    pub fn flush(&mut self, fetcher: &mut dyn PvdFetcher) {
        if let Some(id) = self.outstanding.take() {
            debug!(interface = %self.ifname, request = id.0, "cancelling PvD fetch");
            fetcher.cancel(id);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.pvd_id = None;
        self.prefixes.clear();
        self.sequence = 0;
        self.ok = false;
        self.fetch_failed = false;
        self.additional_info = None;
        self.last_fetch = None;
        self.expiration = None;
        self.outstanding = None;
    }

    /// Decide whether `ra` calls for a fetch, and start it if so
    pub fn evaluate(
        &mut self,
        ra: &RouterAdvertisement,
        now: Instant,
        rng: &mut dyn RngCore,
        config: &PvdConfig,
        fetcher: &mut dyn PvdFetcher,
        notifier: &InterfaceNotifier,
    ) -> PvdDecision {
        if !config.enabled {
            return PvdDecision::Skip(PvdSkipReason::Disabled);
        }

        let option = match ra.pvd() {
            Some(option) if option.http => option,
            _ => {
                if self.pvd_id.is_some() {
                    debug!(
                        interface = %self.ifname,
                        reason = "no PvD advertised",
                        "PvD deprecated"
                    );
                }
                self.flush(fetcher);
                return PvdDecision::Deprecated;
            }
        };

        let prefixes: Vec<Ipv6Prefix> = ra.prefixes().iter().map(|p| p.prefix).collect();

        if self.pvd_id.as_deref() != Some(option.id.as_str()) {
            if let Some(old) = &self.pvd_id {
                info!(interface = %self.ifname, old = %old, new = %option.id, "PvD ID changed");
            }
            self.flush(fetcher);
            self.pvd_id = Some(option.id.clone());
            self.sequence = option.sequence;
            self.prefixes = prefixes;
            return self.issue(now, Duration::ZERO, fetcher, notifier);
        }

        self.prefixes = prefixes;

        if self.fetch_failed {
            return PvdDecision::Skip(PvdSkipReason::NotAllowed);
        }
        if self.outstanding.is_some() {
            return PvdDecision::Skip(PvdSkipReason::InProgress);
        }
        if self
            .last_fetch
            .is_some_and(|last| now.saturating_duration_since(last) < config.min_refetch())
        {
            return PvdDecision::Skip(PvdSkipReason::TooSoon);
        }

        if option.sequence != self.sequence {
            debug!(
                interface = %self.ifname,
                old = self.sequence,
                new = option.sequence,
                "PvD sequence number changed"
            );
            self.sequence = option.sequence;
            let delay = fetch_backoff(option.delay, rng);
            return self.issue(now, delay, fetcher, notifier);
        }

        if self.is_expired(now) {
            return self.issue(now, Duration::ZERO, fetcher, notifier);
        }

        PvdDecision::Skip(PvdSkipReason::Unchanged)
    }

    fn issue(
        &mut self,
        now: Instant,
        delay: Duration,
        fetcher: &mut dyn PvdFetcher,
        notifier: &InterfaceNotifier,
    ) -> PvdDecision {
        let id = PvdRequestId(self.next_request);
        self.next_request += 1;

        let request = PvdRequest {
            pvd_id: self.pvd_id.clone().unwrap_or_default(),
            prefixes: self.prefixes.clone(),
            ifname: self.ifname.clone(),
            delay,
        };

        debug!(
            interface = %self.ifname,
            pvd = %request.pvd_id,
            request = id.0,
            delay_ms = delay.as_millis() as u64,
            "fetching PvD additional information"
        );

        match fetcher.fetch(id, request, notifier.clone()) {
            Ok(()) => {
                self.outstanding = Some(id);
                self.last_fetch = Some(now);
                PvdDecision::Fetch { id, delay }
            }
            Err(e) => {
                warn!(interface = %self.ifname, error = %e, "PvD fetch could not be created");
                self.ok = false;
                self.fetch_failed = true;
                PvdDecision::Skip(PvdSkipReason::CreateFailed)
            }
        }
    }

    /// Apply a fetch outcome; false when `id` is not the outstanding request
    pub fn complete(
        &mut self,
        id: PvdRequestId,
        outcome: PvdFetchOutcome,
        now: Instant,
        utc_now: DateTime<Utc>,
        config: &PvdConfig,
    ) -> bool {
        if self.outstanding != Some(id) {
            debug!(interface = %self.ifname, request = id.0, "ignoring stale PvD completion");
            return false;
        }
        self.outstanding = None;

        match outcome {
            PvdFetchOutcome::Success(info) => {
                let expiration =
                    effective_expiration(&info, now, utc_now, config.default_expiration());
                info!(
                    interface = %self.ifname,
                    pvd = self.pvd_id.as_deref().unwrap_or_default(),
                    "PvD additional information fetched"
                );
                self.additional_info = Some(info);
                self.ok = true;
                self.fetch_failed = false;
                self.last_fetch = Some(now);
                self.expiration = Some(expiration);
            }
            PvdFetchOutcome::NoConnectivity => {
                debug!(interface = %self.ifname, "PvD fetch found no connectivity, will retry");
                self.reset();
            }
            PvdFetchOutcome::Failed => {
                warn!(interface = %self.ifname, "PvD fetch failed");
                self.ok = false;
                self.fetch_failed = true;
                self.additional_info = None;
                self.expiration = None;
            }
        }
        true
    }
}

/// Expiry from the "expires" RFC 3339 key, else `default` after `now`;
/// never earlier than `now`
fn effective_expiration(
    info: &Value,
    now: Instant,
    utc_now: DateTime<Utc>,
    default: Duration,
) -> Instant {
    let expires = info
        .get("expires")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

    match expires {
        Some(expires) => {
            let remaining = expires.with_timezone(&Utc) - utc_now;
            now + remaining.to_std().unwrap_or(Duration::ZERO)
        }
        None => now + default,
    }
}
