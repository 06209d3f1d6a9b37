//! Multicast options of a sending endpoint.
//!
//! Relevant rfc1112 section 7.1. An endpoint keeps its options in a record that only exists while
//! some option differs from the default. Memberships are tracked per (group, interface) pair and
//! hold a reference to the group on the interface.
use crate::layer::{Error, Hooks, Result};
use crate::nic::{Flags as IfFlags, IfIndex};
use crate::stack::Stack;
use crate::wire::Ipv4Address;

/// The multicast options of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastOptions {
    /// The interface for outgoing multicast datagrams, instead of the routed one.
    pub interface: Option<IfIndex>,
    /// The time to live of outgoing multicast datagrams.
    ///
    /// `None` follows `default_multicast_ttl` of the stack's configuration.
    pub ttl: Option<u8>,
    /// Loop datagrams back to this host if it is a member of the group.
    pub loops: bool,
    memberships: Vec<Membership>,
}

/// A joined group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub group: Ipv4Address,
    pub interface: IfIndex,
}

/// A multicast option to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulticastOption {
    /// Select the outgoing interface by one of its addresses, unspecified selects by route.
    Interface(Ipv4Address),
    /// Set the time to live.
    Ttl(u8),
    /// Enable loop back with 1, disable with 0.
    Loop(u8),
    /// Join a group on the interface with the given address, or the routed one if unspecified.
    AddMembership {
        group: Ipv4Address,
        interface: Ipv4Address,
    },
    /// Leave a group, on any interface if unspecified.
    DropMembership {
        group: Ipv4Address,
        interface: Ipv4Address,
    },
}

/// A multicast option to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MulticastOptionKind {
    Interface,
    Ttl,
    Loop,
}

/// The value of a queried option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulticastOptionValue {
    /// The address of the selected interface, unspecified if none is selected.
    Interface(Ipv4Address),
    Ttl(u8),
    Loop(u8),
}

impl MulticastOptions {
    /// Options in their default state.
    pub fn new() -> Self {
        MulticastOptions::default()
    }

    /// The joined groups.
    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    fn is_default(&self) -> bool {
        self.interface.is_none()
            && self.ttl.is_none()
            && self.loops
            && self.memberships.is_empty()
    }

    fn position(&self, group: Ipv4Address, interface: Option<IfIndex>) -> Option<usize> {
        self.memberships.iter().position(|membership| {
            membership.group == group
                && interface.map_or(true, |idx| membership.interface == idx)
        })
    }
}

impl Default for MulticastOptions {
    fn default() -> Self {
        MulticastOptions {
            interface: None,
            ttl: None,
            loops: true,
            memberships: Vec::new(),
        }
    }
}

impl<H: Hooks> Stack<H> {
    /// Change a multicast option of an endpoint.
    ///
    /// The record is created with the first change and freed again when all options are back to
    /// their default state.
    pub fn set_multicast_option(
        &mut self,
        options: &mut Option<Box<MulticastOptions>>,
        option: MulticastOption,
    ) -> Result<()> {
        let mut imo = options.take().unwrap_or_default();
        let result = self.apply_multicast_option(&mut imo, option);
        if !imo.is_default() {
            *options = Some(imo);
        }
        result
    }

    /// Query a multicast option of an endpoint.
    pub fn multicast_option(&self, options: Option<&MulticastOptions>, kind: MulticastOptionKind)
        -> MulticastOptionValue
    {
        match kind {
            MulticastOptionKind::Interface => {
                let addr = options
                    .and_then(|imo| imo.interface)
                    .and_then(|idx| self.interfaces.get(idx.0))
                    .and_then(|iface| iface.primary_addr())
                    .unwrap_or(Ipv4Address::UNSPECIFIED);
                MulticastOptionValue::Interface(addr)
            },
            MulticastOptionKind::Ttl => {
                MulticastOptionValue::Ttl(self.multicast_ttl(options))
            },
            MulticastOptionKind::Loop => {
                MulticastOptionValue::Loop(options.map_or(true, |imo| imo.loops) as u8)
            },
        }
    }

    /// The time to live of multicast datagrams sent with `options`.
    pub(crate) fn multicast_ttl(&self, options: Option<&MulticastOptions>) -> u8 {
        options
            .and_then(|imo| imo.ttl)
            .unwrap_or(self.config.default_multicast_ttl)
    }

    /// Leave all groups of an endpoint that is closed.
    pub fn free_multicast_options(&mut self, options: Option<Box<MulticastOptions>>) {
        if let Some(imo) = options {
            for membership in &imo.memberships {
                if let Some(iface) = self.interfaces.get_mut(membership.interface.0) {
                    iface.leave(membership.group);
                }
            }
        }
    }

    fn apply_multicast_option(&mut self, imo: &mut MulticastOptions, option: MulticastOption) -> Result<()> {
        match option {
            MulticastOption::Interface(addr) => {
                if addr.is_unspecified() {
                    imo.interface = None;
                    return Ok(());
                }
                let idx = self.multicast_interface(addr).ok_or(Error::AddrNotAvailable)?;
                imo.interface = Some(idx);
            },
            MulticastOption::Ttl(ttl) => {
                imo.ttl = Some(ttl).filter(|&ttl| ttl != self.config.default_multicast_ttl);
            },
            MulticastOption::Loop(value) => {
                if value > 1 {
                    return Err(Error::Invalid);
                }
                imo.loops = value == 1;
            },
            MulticastOption::AddMembership { group, interface } => {
                if !group.is_multicast() {
                    return Err(Error::Invalid);
                }
                let idx = if interface.is_unspecified() {
                    self.route_lookup(group, false)
                        .and_then(|id| self.routes.get(id))
                        .map(|route| route.interface)
                } else {
                    self.iface_with_addr(interface).map(|(idx, _)| idx)
                };
                let idx = idx
                    .filter(|idx| self.interfaces.get(idx.0)
                        .map_or(false, |iface| iface.flags().contains(IfFlags::MULTICAST)))
                    .ok_or(Error::AddrNotAvailable)?;
                if imo.position(group, Some(idx)).is_some() {
                    return Err(Error::AddrInUse);
                }
                if imo.memberships.len() >= self.config.max_memberships {
                    return Err(Error::TooManyRefs);
                }
                let iface = self.interfaces.get_mut(idx.0).ok_or(Error::AddrNotAvailable)?;
                iface.join(group);
                imo.memberships.push(Membership { group, interface: idx });
                net_debug!("joined {} on {}", group, idx);
            },
            MulticastOption::DropMembership { group, interface } => {
                if !group.is_multicast() {
                    return Err(Error::Invalid);
                }
                let idx = if interface.is_unspecified() {
                    None
                } else {
                    let (idx, _) = self.iface_with_addr(interface).ok_or(Error::AddrNotAvailable)?;
                    Some(idx)
                };
                let pos = imo.position(group, idx).ok_or(Error::AddrNotAvailable)?;
                let membership = imo.memberships.remove(pos);
                if let Some(iface) = self.interfaces.get_mut(membership.interface.0) {
                    iface.leave(group);
                }
                net_debug!("left {} on {}", group, membership.interface);
            },
        }
        Ok(())
    }

    /// The multicast capable interface with the address `addr`.
    fn multicast_interface(&self, addr: Ipv4Address) -> Option<IfIndex> {
        let (idx, _) = self.iface_with_addr(addr)?;
        let iface = self.interfaces.get(idx.0)?;
        if iface.flags().contains(IfFlags::MULTICAST) {
            Some(idx)
        } else {
            None
        }
    }
}
