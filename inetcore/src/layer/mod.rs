//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. The state of all layers is owned by one [`Stack`], which is
//! open to modifications while processing does not take place, similar to reconfiguration on the
//! OS level with utilities such as `arp`, `route` or `ifconfig`.
//!
//! ## Receiving
//!
//! Received IP datagrams are validated, reassembled and handed to the protocol handler registered
//! for their protocol number, see [`ip::Recv`]. Received ARP frames feed the address resolution
//! cache directly.
//!
//! ## Sending
//!
//! Outgoing datagrams are complete IPv4 packets. The output path fills in the remaining header
//! fields, picks a route, resolves the link address of the next hop and fragments where the
//! datagram exceeds the MTU of the path.
//!
//! ## External collaborators
//!
//! ICMP error generation, multicast routing and packet filtering are not part of this crate. They
//! are reached through the [`Hooks`] trait whose methods all have no-op defaults.
//!
//! [`Stack`]: ../stack/struct.Stack.html
//! [`ip::Recv`]: ip/trait.Recv.html
//! [`Hooks`]: trait.Hooks.html
use core::fmt;

pub mod arp;
mod hook;
pub mod ip;

pub use hook::{Hooks, IcmpError, NoHooks, Verdict};

pub type Result<T> = core::result::Result<T, Error>;

/// The error returned by outbound operations and by configuration of the layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the device, interface or option state does not allow an operation.
    Illegal,

    /// The datagram is inconsistent with its own header.
    BadSize,

    /// Unable to find a route towards the destination address.
    Unreachable,

    /// The host can not be reached, or the gateway towards it does not answer address resolution.
    HostUnreachable,

    /// The directly attached destination does not answer address resolution.
    HostDown,

    /// The outgoing interface is down.
    NetDown,

    /// No interface with a suitable address is available.
    AddrNotAvailable,

    /// Broadcast was not requested for a broadcast destination.
    Access,

    /// The datagram is too large and may not be fragmented.
    MessageSize,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources.
    Exhausted,

    /// The multicast membership already exists.
    AddrInUse,

    /// The limit of multicast memberships has been reached.
    TooManyRefs,

    /// An argument was out of range.
    Invalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Error::Illegal => "operation not permitted",
            Error::BadSize => "bad datagram size",
            Error::Unreachable => "no route to host",
            Error::HostUnreachable => "host unreachable",
            Error::HostDown => "host is down",
            Error::NetDown => "network is down",
            Error::AddrNotAvailable => "address not available",
            Error::Access => "broadcast not permitted",
            Error::MessageSize => "message too long",
            Error::Exhausted => "no buffer space available",
            Error::AddrInUse => "membership already exists",
            Error::TooManyRefs => "too many memberships",
            Error::Invalid => "invalid argument",
        })
    }
}

impl std::error::Error for Error {}

/// A wrapper to use a closure as a handler.
///
/// Implements the receive trait of the layers for any closure with a matching signature, see
/// [`ip::Recv`].
///
/// [`ip::Recv`]: ip/trait.Recv.html
pub struct FnHandler<F>(pub F);

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed.
impl From<crate::wire::Error> for Error {
    fn from(err: crate::wire::Error) -> Self {
        match err {
            crate::wire::Error::Truncated => Error::BadSize,
            _ => Error::Illegal,
        }
    }
}
