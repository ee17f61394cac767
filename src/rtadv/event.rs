//! Events delivered to the per-interface state machines

use super::interface::InterfaceInfo;
use super::pvd::{PvdFetchOutcome, PvdRequestId};
use crate::protocol::ndp::RouterAdvertisement;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Input to one interface's state machine
#[derive(Debug, Clone)]
pub enum RtadvEvent {
    RouterAdvertisement(Arc<RouterAdvertisement>),
    LinkStatusChanged,
    AddressChanged,
    Dhcpv6StatusChanged,
    /// DHCPv6 client asks for a failure symptom
    Dhcpv6Symptom,
    /// Re-solicit and re-verify addresses
    Renew,
    NetworkChanged,
    Wake,
    /// Route table watcher saw the router expire
    RouterExpired,
    PvdFetchComplete {
        request: PvdRequestId,
        outcome: PvdFetchOutcome,
    },
}

/// Input to the daemon run loop
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    Start(InterfaceInfo),
    Stop { if_index: u32 },
    Interface { if_index: u32, event: RtadvEvent },
}

pub type EventSender = mpsc::UnboundedSender<DaemonEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DaemonEvent>;

/// Posts events for one interface back into the run loop
///
/// Handed to the RA receive callback and to the DHCPv6 and PvD
/// collaborators, whose completions arrive asynchronously.
#[derive(Debug, Clone)]
pub struct InterfaceNotifier {
    if_index: u32,
    tx: EventSender,
}

impl InterfaceNotifier {
    pub fn new(if_index: u32, tx: EventSender) -> Self {
        Self { if_index, tx }
    }

    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    pub fn post(&self, event: RtadvEvent) {
        let if_index = self.if_index;
        if self
            .tx
            .send(DaemonEvent::Interface { if_index, event })
            .is_err()
        {
            trace!(if_index, "event dropped, run loop gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_tags_interface() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = InterfaceNotifier::new(7, tx);
        notifier.post(RtadvEvent::Renew);

        match rx.try_recv().unwrap() {
            DaemonEvent::Interface { if_index, event } => {
                assert_eq!(if_index, 7);
                assert!(matches!(event, RtadvEvent::Renew));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        InterfaceNotifier::new(1, tx).post(RtadvEvent::Wake);
    }
}
