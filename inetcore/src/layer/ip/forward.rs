//! Forwarding of datagrams not addressed to this host.
//!
//! Relevant rfc1812 section 5.2. The forwarding path keeps its own route cache, and a copy of the
//! start of each datagram so that errors of the output path can be reported to the sender.
use crate::layer::{Error, Hooks, IcmpError};
use crate::layer::ip::{OutputFlags, RouteCache, RouteFlags, RouteId};
use crate::nic::IfIndex;
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::{Buffer, BufferFlags};
use crate::wire::{ipv4_packet, Ipv4Address};

/// Octets of a forwarded datagram quoted in errors.
const MCOPY_LEN: usize = 64;

/// Decrement of the time to live per hop.
const TTL_DEC: u8 = 1;

/// Whether a datagram to `addr` may be forwarded at all.
///
/// Multicast, experimental addresses, the loopback network and network zero are never forwarded.
pub(crate) fn can_forward(addr: Ipv4Address) -> bool {
    !(addr.is_multicast() || addr.is_experimental() || addr.is_loopback() || addr.is_net_zero())
}

impl<H: Hooks> Stack<H> {
    /// Forward a datagram received on `interface`.
    ///
    /// `source_routed` is set when the next hop came from a source route option, which suppresses
    /// redirects.
    pub(crate) fn ip_forward(&mut self, mut datagram: Buffer, interface: IfIndex, source_routed: bool) {
        let (dst, src, ttl) = {
            let header = ipv4_packet::new_unchecked(datagram.head());
            (header.dst_addr(), header.src_addr(), header.hop_limit())
        };

        if datagram.meta().flags.contains(BufferFlags::BCAST) || !can_forward(dst) {
            net_trace!("can not forward to {}", dst);
            self.stats.ip.cant_forward += 1;
            self.stats.drops.record(DropReason::CantForward);
            return;
        }

        if ttl <= TTL_DEC {
            self.hooks.icmp_error(datagram, IcmpError::TimeExceeded);
            return;
        }
        ipv4_packet::new_unchecked_mut(datagram.head_mut()).set_hop_limit(ttl - TTL_DEC);

        let route = match self.forward_route_for(dst) {
            Some(route) => route,
            None => {
                self.hooks.icmp_error(datagram, IcmpError::HostUnreachable);
                return;
            },
        };

        let mcopy = datagram.copy_segment(0, datagram.len().min(MCOPY_LEN));
        let redirect = if source_routed { None } else { self.redirect_for(route, interface, src, dst) };

        datagram.meta_mut().flags.insert(BufferFlags::FORWARDED);
        let mut cache = core::mem::take(&mut self.forward_route);
        let result = self.ip_output(
            datagram,
            Some(&mut cache),
            OutputFlags::FORWARDING | OutputFlags::ALLOW_BROADCAST,
            None);
        self.forward_route = cache;

        let error = match result {
            Ok(()) => {
                self.stats.ip.forward += 1;
                match redirect {
                    Some(gateway) => {
                        self.stats.ip.redirect_sent += 1;
                        IcmpError::RedirectHost { gateway }
                    },
                    None => return,
                }
            },
            Err(err) => {
                net_trace!("forwarding to {} failed: {}", dst, err);
                self.stats.ip.cant_forward += 1;
                match err {
                    Error::MessageSize => {
                        let mtu = self.forward_route.route
                            .and_then(|id| self.routes.get(id))
                            .and_then(|route| self.interfaces.get(route.interface.0))
                            .map(|iface| iface.mtu().min(usize::from(u16::max_value())) as u16);
                        IcmpError::NeedFragmentation { mtu }
                    },
                    Error::Exhausted => IcmpError::SourceQuench,
                    _ => IcmpError::HostUnreachable,
                }
            },
        };
        self.hooks.icmp_error(mcopy, error);
    }

    /// The gateway to suggest to the sender, if it should have sent to it directly.
    ///
    /// Only when the datagram leaves on the interface it arrived on, over a route neither created
    /// by a redirect nor the default route, and the sender is on the attached network.
    fn redirect_for(&self, id: RouteId, interface: IfIndex, src: Ipv4Address, dst: Ipv4Address)
        -> Option<Ipv4Address>
    {
        if !self.config.send_redirects {
            return None;
        }
        let route = self.routes.get(id)?;
        if route.interface != interface
            || route.flags.intersects(RouteFlags::DYNAMIC | RouteFlags::MODIFIED)
            || route.is_default()
        {
            return None;
        }
        let iface = self.interfaces.get(interface.0)?;
        let on_link = iface.addrs().iter()
            .find(|ifa| ifa.address() == route.ifaddr)
            .map_or(false, |ifa| ifa.cidr.subnet().contains(src));
        if !on_link {
            return None;
        }
        match route.gateway {
            Some(gateway) if route.flags.contains(RouteFlags::GATEWAY) => Some(gateway),
            _ => Some(dst),
        }
    }

    /// The cached route of the forwarding path towards `dst`.
    pub(crate) fn forward_route_for(&mut self, dst: Ipv4Address) -> Option<RouteId> {
        let cache = self.forward_route;
        if let Some(id) = cache.route {
            if cache.dst == Some(dst) && self.routes.is_up(id) {
                return Some(id);
            }
            self.routes.release(id);
        }
        self.forward_route = RouteCache::new();

        let id = self.route_lookup(dst, true)?;
        self.routes.hold(id);
        self.forward_route = RouteCache { route: Some(id), dst: Some(dst) };
        Some(id)
    }

    /// The local address on the route towards `dst`.
    pub(crate) fn source_route_addr(&mut self, dst: Ipv4Address) -> Option<Ipv4Address> {
        let id = self.forward_route_for(dst)?;
        self.routes.get(id).map(|route| route.ifaddr)
    }
}
