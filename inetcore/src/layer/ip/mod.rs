//! The IPv4 layer.
//!
//! Received datagrams pass through a fixed sequence of stages: validation of the header, the
//! filter hook, option processing, the destination test, reassembly and finally dispatch to the
//! [`Recv`] handler registered for their protocol. Each stage either hands the datagram on or
//! returns the [`DropReason`] that ends its processing. Datagrams not addressed to this host are
//! forwarded when enabled.
//!
//! Outgoing datagrams are complete IPv4 packets whose header the output path completes. It picks
//! a route, caching it in a caller provided [`RouteCache`] when given one, treats multicast and
//! broadcast destinations, fragments where the datagram exceeds the MTU of the path and resolves
//! the link address of the next hop.
//!
//! [`Recv`]: trait.Recv.html
//! [`DropReason`]: ../../stats/enum.DropReason.html
//! [`RouteCache`]: struct.RouteCache.html
use bitflags::bitflags;

use crate::layer::FnHandler;
use crate::nic::IfIndex;
use crate::storage::Buffer;
use crate::wire::{ipv4_packet, IpProtocol, Ipv4Address};

mod forward;
mod input;
mod multicast;
mod options;
mod output;
mod reass;
mod route;

pub use multicast::{
    Membership,
    MulticastOption,
    MulticastOptionKind,
    MulticastOptions,
    MulticastOptionValue,
};

pub use reass::Reassembly;

pub use route::{
    Flags as RouteFlags,
    Lookup,
    Route,
    RouteId,
    Routes,
};

/// A datagram delivered to a protocol.
#[derive(Debug)]
pub struct InPacket {
    /// The complete datagram, its header is contiguous at the head of the buffer.
    pub datagram: Buffer,
    /// The length of the header, including options.
    pub header_len: usize,
    /// The interface the datagram was received on.
    pub interface: IfIndex,
}

impl InPacket {
    /// The header, as a packet view.
    pub fn header(&self) -> &ipv4_packet {
        ipv4_packet::new_unchecked(&self.datagram.head()[..self.header_len])
    }

    pub fn src_addr(&self) -> Ipv4Address {
        self.header().src_addr()
    }

    pub fn dst_addr(&self) -> Ipv4Address {
        self.header().dst_addr()
    }

    pub fn protocol(&self) -> IpProtocol {
        self.header().protocol()
    }

    /// A copy of the payload octets.
    pub fn payload(&self) -> Vec<u8> {
        self.datagram.copy_range(self.header_len, self.datagram.len() - self.header_len)
    }
}

/// A receiver for one IP protocol.
///
/// Handlers are registered with the stack by protocol number.
pub trait Recv: Send {
    /// Inspect one incoming datagram.
    fn receive(&mut self, packet: InPacket);
}

impl<F> Recv for FnHandler<F>
    where F: FnMut(InPacket) + Send,
{
    fn receive(&mut self, packet: InPacket) {
        self.0(packet)
    }
}

bitflags! {
    /// Modifiers of the output path.
    #[derive(Default)]
    pub struct OutputFlags: u8 {
        /// The datagram is forwarded, its header is kept as is.
        const FORWARDING      = 0x01;
        /// The caller supplied a complete header.
        const RAW_OUTPUT      = 0x02;
        /// Bypass the routing table and send directly on the interface of the destination.
        const ROUTE_TO_IF     = 0x04;
        /// Sending to a broadcast address is permitted.
        const ALLOW_BROADCAST = 0x08;
    }
}

/// A cached route towards one destination.
///
/// The output path reuses the route while it is up and the destination unchanged. Pass the cache
/// back to [`Stack::release_route`] when done with it.
///
/// [`Stack::release_route`]: ../../stack/struct.Stack.html#method.release_route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteCache {
    pub(crate) route: Option<RouteId>,
    pub(crate) dst: Option<Ipv4Address>,
}

impl RouteCache {
    pub fn new() -> Self {
        RouteCache::default()
    }

    /// The cached route, if any.
    pub fn route(&self) -> Option<RouteId> {
        self.route
    }

    /// The destination the route was looked up for.
    pub fn destination(&self) -> Option<Ipv4Address> {
        self.dst
    }
}
