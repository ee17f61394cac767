//! IPv6 router discovery
//!
//! Per-interface state machines ([`RtadvService`]) multiplexed over one
//! raw ICMPv6 socket ([`RtadvSocketManager`]) and driven by [`RtadvDaemon`].

pub mod address;
pub mod clat46;
pub mod daemon;
pub mod dhcpv6;
pub mod event;
pub mod interface;
pub mod publish;
pub mod pvd;
pub mod service;
pub mod socket;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use clat46::Clat46AddressPool;
pub use daemon::{RtadvCollaborators, RtadvDaemon};
pub use dhcpv6::{Dhcpv6Client, Dhcpv6ClientFactory, Dhcpv6Info, Dhcpv6Mode};
pub use event::{DaemonEvent, EventReceiver, EventSender, InterfaceNotifier, RtadvEvent};
pub use interface::{
    InterfaceInfo, InterfaceLayer, Ipv4AddressConfig, Ipv6AddressInfo, LinkStatus, LinkType,
};
pub use publish::{Ipv4SyntheticConfig, PublishStatus, Publisher, ServiceInfo};
pub use pvd::{PvdFetchOutcome, PvdFetcher, PvdInfoContext, PvdRequest, PvdRequestId};
pub use service::{RtadvEnv, RtadvService, RtadvState};
pub use socket::{RaCallback, RtadvSocketHandle, RtadvSocketManager, SolicitError};
pub use timer::TimerCallout;
