use crate::nic::IfIndex;
use crate::storage::Buffer;
use crate::wire::Ipv4Address;

use super::Result;

/// An ICMP error to be generated for a received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcmpError {
    /// No route to the destination network.
    NetUnreachable,
    /// The destination host can not be reached.
    HostUnreachable,
    /// No handler for the datagram's protocol.
    ProtocolUnreachable,
    /// Fragmentation needed but forbidden, with the MTU of the next hop if known.
    NeedFragmentation { mtu: Option<u16> },
    /// A source route could not be followed.
    SourceRouteFailed,
    /// Out of buffers on the way.
    SourceQuench,
    /// The time to live reached zero in transit.
    TimeExceeded,
    /// A header field is invalid, `pointer` is the offset of the offending octet.
    ParameterProblem { pointer: u8 },
    /// The sender should use `gateway` for this destination.
    RedirectHost { gateway: Ipv4Address },
}

/// The result of a filter.
#[derive(Debug)]
pub enum Verdict {
    /// Continue processing with the (possibly rewritten) datagram.
    Pass(Buffer),
    /// The filter consumed the datagram.
    Drop,
}

/// Capabilities of the stack that are implemented outside of it.
///
/// All methods have defaults that do nothing, or let everything pass.
pub trait Hooks: Send {
    /// Generate an ICMP error about `original`.
    ///
    /// The buffer holds the offending datagram with its header, the hook decides how much of it
    /// to quote.
    fn icmp_error(&mut self, _original: Buffer, _error: IcmpError) { }

    /// Whether a multicast router is running.
    ///
    /// Only then are multicast datagrams handed to `mcast_forward`.
    fn is_multicast_router(&self) -> bool {
        false
    }

    /// Forward a multicast datagram received or sent on `interface`.
    ///
    /// An error means that the datagram must not be processed any further.
    fn mcast_forward(&mut self, _datagram: &Buffer, _interface: Option<IfIndex>) -> Result<()> {
        Ok(())
    }

    /// Inspect a received datagram before any processing beyond validation.
    fn filter(&mut self, datagram: Buffer, _interface: IfIndex) -> Verdict {
        Verdict::Pass(datagram)
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks { }
