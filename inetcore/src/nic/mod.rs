//! Encapsulates a network interface.
//!
//! The stack does not drive hardware. An attached [`Interface`] describes what the stack needs to
//! know of a link (addresses, flags, MTU) and carries a [`Device`] with the transmit entry point
//! of its driver. Framing beyond the link-layer destination and ethertype is the device's
//! business.
//!
//! [`Interface`]: struct.Interface.html
//! [`Device`]: trait.Device.html
use core::fmt;

use bitflags::bitflags;

use crate::layer::Result;
use crate::storage::Buffer;
use crate::wire::{EthernetAddress, EthernetProtocol, Ipv4Address, Ipv4Cidr};

pub mod loopback;

pub use self::loopback::{Loopback, Tap};

/// Handle of an interface attached to a stack.
///
/// Handles are not reused while the interface is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IfIndex(pub usize);

impl fmt::Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

bitflags! {
    /// Link properties of an interface.
    pub struct Flags: u16 {
        /// Administratively up.
        const UP                = 0x0001;
        /// Supports link-layer broadcast, and thus address resolution.
        const BROADCAST         = 0x0002;
        /// The software loopback interface.
        const LOOPBACK          = 0x0004;
        /// A point-to-point link with a single peer.
        const POINTOPOINT       = 0x0008;
        /// Do not use address resolution, link addresses are derived from protocol addresses.
        const NOARP             = 0x0010;
        /// Supports multicast.
        const MULTICAST         = 0x0020;
        /// A link with several peers whose MTU may differ per destination.
        const POINTTOMULTIPOINT = 0x0040;
    }
}

/// An address assigned to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IfAddr {
    /// The local address and the prefix of the attached subnet.
    pub cidr: Ipv4Cidr,
    /// The peer address on a point-to-point link.
    pub peer: Option<Ipv4Address>,
}

impl IfAddr {
    pub fn new(cidr: Ipv4Cidr) -> Self {
        IfAddr { cidr, peer: None }
    }

    /// The local address.
    pub fn address(&self) -> Ipv4Address {
        self.cidr.address()
    }

    /// The directed broadcast address of the attached subnet, if it has one.
    pub fn broadcast(&self) -> Option<Ipv4Address> {
        self.cidr.broadcast()
    }

    /// Query whether `addr` is one of the broadcast forms of this subnet.
    ///
    /// This includes the all-zero host form used by older hosts, the limited broadcast, and both
    /// forms for the classful network containing the subnet.
    pub fn is_broadcast(&self, addr: Ipv4Address) -> bool {
        let net = self.classful_net();
        addr.is_broadcast()
            || Some(addr) == self.cidr.broadcast()
            || Some(addr) == self.cidr.network()
            || Some(addr) == net.broadcast()
            || Some(addr) == net.network()
    }

    /// The network of the address class, narrowed to the subnet if that is larger.
    fn classful_net(&self) -> Ipv4Cidr {
        let address = self.cidr.address();
        let prefix = address.class_prefix().min(self.cidr.prefix_len());
        Ipv4Cidr::new(address, prefix)
    }
}

/// A frame handed to a device for transmission.
#[derive(Debug)]
pub struct Frame {
    /// The link-layer destination.
    pub dst_hw: EthernetAddress,
    /// The link-layer protocol of the payload.
    pub ethertype: EthernetProtocol,
    /// The network layer packet.
    pub payload: Buffer,
}

/// The driver side of an interface.
pub trait Device: Send {
    /// Queue a frame for transmission.
    ///
    /// An error is reported to the sender of the datagram, the frame is consumed either way.
    fn transmit(&mut self, frame: Frame) -> Result<()>;

    /// The MTU towards a specific destination.
    ///
    /// Only consulted on point-to-multipoint interfaces.
    fn query_mtu(&self, _dst: Ipv4Address) -> Option<usize> {
        None
    }
}

/// The stack's view of an attached interface.
pub struct Interface {
    name: String,
    flags: Flags,
    mtu: usize,
    hw_addr: EthernetAddress,
    addrs: Vec<IfAddr>,
    groups: Vec<(Ipv4Address, usize)>,
    device: Box<dyn Device>,
}

impl Interface {
    /// Describe an interface that is up, with broadcast and multicast capability.
    pub fn new<D>(name: &str, hw_addr: EthernetAddress, mtu: usize, device: D) -> Self
        where D: Device + 'static,
    {
        Interface {
            name: name.to_owned(),
            flags: Flags::UP | Flags::BROADCAST | Flags::MULTICAST,
            mtu,
            hw_addr,
            addrs: Vec::new(),
            groups: Vec::new(),
            device: Box::new(device),
        }
    }

    /// Replace the link flags.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Add an address before attaching.
    pub fn with_addr(mut self, addr: IfAddr) -> Self {
        self.addrs.push(addr);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    pub fn is_up(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn set_mtu(&mut self, mtu: usize) {
        self.mtu = mtu;
    }

    /// The MTU to use towards `dst`.
    pub fn mtu_for(&self, dst: Ipv4Address) -> usize {
        if self.flags.contains(Flags::POINTTOMULTIPOINT) {
            if let Some(mtu) = self.device.query_mtu(dst) {
                return mtu;
            }
        }
        self.mtu
    }

    pub fn hw_addr(&self) -> EthernetAddress {
        self.hw_addr
    }

    /// All addresses, the first is the primary one.
    pub fn addrs(&self) -> &[IfAddr] {
        &self.addrs
    }

    pub(crate) fn addrs_mut(&mut self) -> &mut Vec<IfAddr> {
        &mut self.addrs
    }

    /// The primary address, used as a source when nothing more specific applies.
    pub fn primary_addr(&self) -> Option<Ipv4Address> {
        self.addrs.first().map(IfAddr::address)
    }

    /// Query whether `addr` is assigned to this interface.
    pub fn has_addr(&self, addr: Ipv4Address) -> bool {
        self.addrs.iter().any(|ifa| ifa.address() == addr)
    }

    /// The assigned address whose subnet contains `addr`.
    pub fn addr_for_subnet(&self, addr: Ipv4Address) -> Option<&IfAddr> {
        self.addrs.iter().find(|ifa| ifa.cidr.subnet().contains(addr))
    }

    /// Query whether `addr` is a broadcast address on this interface.
    pub fn is_broadcast(&self, addr: Ipv4Address) -> bool {
        self.flags.contains(Flags::BROADCAST)
            && self.addrs.iter().any(|ifa| ifa.is_broadcast(addr))
    }

    /// Multicast groups joined on this interface.
    pub fn groups(&self) -> impl Iterator<Item=Ipv4Address> + '_ {
        self.groups.iter().map(|&(group, _)| group)
    }

    /// Query group membership.
    pub fn is_member(&self, group: Ipv4Address) -> bool {
        self.groups.iter().any(|&(g, _)| g == group)
    }

    /// Take a reference to a group, joining it with the first one.
    pub fn join(&mut self, group: Ipv4Address) {
        match self.groups.iter_mut().find(|(g, _)| *g == group) {
            Some((_, refs)) => *refs += 1,
            None => self.groups.push((group, 1)),
        }
    }

    /// Give back a reference to a group, leaving it with the last one.
    pub fn leave(&mut self, group: Ipv4Address) {
        if let Some(idx) = self.groups.iter().position(|&(g, _)| g == group) {
            self.groups[idx].1 -= 1;
            if self.groups[idx].1 == 0 {
                self.groups.remove(idx);
            }
        }
    }

    pub(crate) fn transmit(&mut self, frame: Frame) -> Result<()> {
        self.device.transmit(frame)
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("mtu", &self.mtu)
            .field("hw_addr", &self.hw_addr)
            .field("addrs", &self.addrs)
            .field("groups", &self.groups)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn broadcast_forms() {
        let ifa = IfAddr::new(Ipv4Cidr::new(Ipv4Address::new(10, 1, 2, 3), 24));
        assert!(ifa.is_broadcast(Ipv4Address::BROADCAST));
        assert!(ifa.is_broadcast(Ipv4Address::new(10, 1, 2, 255)));
        assert!(ifa.is_broadcast(Ipv4Address::new(10, 1, 2, 0)));
        // The class A network around the subnet.
        assert!(ifa.is_broadcast(Ipv4Address::new(10, 255, 255, 255)));
        assert!(ifa.is_broadcast(Ipv4Address::new(10, 0, 0, 0)));
        assert!(!ifa.is_broadcast(Ipv4Address::new(10, 1, 3, 255)));
        assert!(!ifa.is_broadcast(Ipv4Address::new(10, 1, 2, 3)));

        // A supernet is not split at the class boundary.
        let ifa = IfAddr::new(Ipv4Cidr::new(Ipv4Address::new(192, 168, 1, 7), 16));
        assert!(ifa.is_broadcast(Ipv4Address::new(192, 168, 255, 255)));
        assert!(!ifa.is_broadcast(Ipv4Address::new(192, 168, 1, 255)));
        assert!(!ifa.is_broadcast(Ipv4Address::new(192, 168, 1, 0)));
    }
}
