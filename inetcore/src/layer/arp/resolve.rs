use bitflags::bitflags;

use crate::layer::{Error, Hooks, Result};
use crate::layer::ip::{Route, RouteFlags, RouteId};
use crate::nic::{Flags as IfFlags, IfIndex};
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::{Buffer, BufferFlags};
use crate::time::{Expiration, Instant};
use crate::wire::{arp_packet, ArpOperation, ArpRepr, EthernetAddress, EthernetProtocol};
use crate::wire::{Ipv4Address, Ipv4Subnet};

bitflags! {
    /// Properties of a resolution entry.
    #[derive(Default)]
    pub struct Flags: u8 {
        /// The entry has a hardware address.
        const COMPLETE  = 0x01;
        /// The entry never expires.
        const PERMANENT = 0x02;
        /// This host answers requests for the address.
        const PUBLISHED = 0x04;
    }
}

/// A snapshot of one resolution entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub protocol_addr: Ipv4Address,
    pub hardware_addr: Option<EthernetAddress>,
    pub interface: IfIndex,
    pub flags: Flags,
    pub expires: Expiration,
}

/// The outcome of resolving the link address of a next hop.
#[derive(Debug)]
pub enum Resolution {
    /// The address is known, send the datagram to it.
    Resolved(EthernetAddress, Buffer),
    /// The datagram was queued, or dropped, until the address is known.
    Queued,
}

impl<H: Hooks> Stack<H> {
    /// Process a received ARP packet.
    ///
    /// `frame` holds the ARP packet without the link header, `interface` is where it arrived.
    pub fn arp_input(&mut self, frame: Buffer, interface: IfIndex, now: Instant) {
        self.set_time(now);
        self.stats.arp.received += 1;
        if let Err(reason) = self.process_arp(frame, interface) {
            net_trace!("arp: dropped frame on {}: {}", interface, reason);
            self.stats.drops.record(reason);
        }
    }

    /// Add or replace a resolution entry.
    ///
    /// The address must be on a network attached to an interface using address resolution. An
    /// entry without `PERMANENT` expires like a learned one. With `PUBLISHED` this host answers
    /// requests for the address, an all-zero hardware address then stands for the hardware
    /// address of the interface.
    pub fn arp_set(&mut self, addr: Ipv4Address, hw: EthernetAddress, flags: Flags) -> Result<()> {
        let key = match self.arp_lookup(addr, false) {
            Some(key) => key,
            None => {
                let (idx, ifaddr) = self.iface_with_net(addr)
                    .filter(|&(idx, _)| self.uses_arp(idx))
                    .ok_or(Error::Unreachable)?;
                let route = Route::interface(Ipv4Subnet::host(addr), idx, ifaddr)
                    .with_flags(RouteFlags::HOST | RouteFlags::STATIC);
                let id = self.routes.add(route)?;
                self.arp_attach(id).ok_or(Error::Exhausted)?
            },
        };

        let expire = if flags.contains(Flags::PERMANENT) {
            Expiration::Never
        } else {
            Expiration::When(self.now + self.config.arp_keep)
        };
        let id = {
            let record = self.arp.get_mut(key).ok_or(Error::Exhausted)?;
            record.set_hardware_addr(Some(hw));
            record.set_published(flags.contains(Flags::PUBLISHED));
            *record.asked_mut() = 0;
            record.route()
        };
        if let Some(route) = self.routes.get_mut(id) {
            route.expire = expire;
            route.flags.remove(RouteFlags::REJECT);
        }
        self.arp.touch(key);
        net_debug!("arp: set {} at {} ({:?})", addr, hw, flags);
        self.release_hold(key);
        Ok(())
    }

    /// Delete the resolution entry of an address, together with its host route.
    pub fn arp_delete(&mut self, addr: Ipv4Address) -> Result<()> {
        let key = self.arp_lookup(addr, false).ok_or(Error::AddrNotAvailable)?;
        let id = self.arp.get(key).map(|record| record.route()).ok_or(Error::AddrNotAvailable)?;
        self.route_delete(id);
        Ok(())
    }

    /// Query the resolution entry of an address.
    pub fn arp_get(&mut self, addr: Ipv4Address) -> Option<Entry> {
        let key = self.arp_lookup(addr, false)?;
        let record = self.arp.get(key)?;
        let route = self.routes.get(record.route())?;
        let mut flags = Flags::empty();
        flags.set(Flags::COMPLETE, record.hardware_addr().is_some());
        flags.set(Flags::PERMANENT, route.expire.is_never());
        flags.set(Flags::PUBLISHED, record.is_published());
        Some(Entry {
            protocol_addr: addr,
            hardware_addr: record.hardware_addr(),
            interface: route.interface,
            flags,
            expires: route.expire,
        })
    }

    /// Announce all addresses of an interface with gratuitous requests.
    pub fn announce(&mut self, interface: IfIndex) {
        let addrs: Vec<_> = match self.interfaces.get(interface.0) {
            Some(iface) => iface.addrs().iter().map(|ifa| ifa.address()).collect(),
            None => return,
        };
        if !self.uses_arp(interface) {
            return;
        }
        for addr in addrs {
            self.arp_whohas(interface, addr);
        }
    }

    /// Resolve the hardware address of `dst` for a datagram sent on `route`.
    pub(crate) fn arp_resolve(
        &mut self,
        interface: IfIndex,
        route: Option<RouteId>,
        dst: Ipv4Address,
        buffer: Buffer,
    ) -> Result<Resolution> {
        let meta = buffer.meta();
        if meta.flags.contains(BufferFlags::BCAST) {
            return Ok(Resolution::Resolved(EthernetAddress::BROADCAST, buffer));
        }
        if meta.flags.contains(BufferFlags::MCAST) {
            return Ok(Resolution::Resolved(EthernetAddress::from_ipv4_multicast(dst), buffer));
        }

        let iface = self.interfaces.get(interface.0).ok_or(Error::NetDown)?;
        if iface.flags().contains(IfFlags::NOARP) {
            let hw = Self::synthesize(iface.hw_addr(), dst);
            return Ok(Resolution::Resolved(hw, buffer));
        }

        let key = route
            .and_then(|id| self.routes.get(id))
            .and_then(Route::link_info)
            .or_else(|| self.arp_lookup(dst, true));
        let key = match key {
            Some(key) => key,
            None => {
                net_debug!("arp: no resolution record for {}", dst);
                return Ok(Resolution::Queued);
            },
        };

        let now = self.now;
        let (id, hw) = match self.arp.get(key) {
            Some(record) => (record.route(), record.hardware_addr()),
            None => return Ok(Resolution::Queued),
        };
        let expire = match self.routes.get(id) {
            Some(route) => route.expire,
            None => return Ok(Resolution::Queued),
        };

        if let Some(hw) = hw {
            if !expire.is_reached(now) {
                return Ok(Resolution::Resolved(hw, buffer));
            }
        }

        // No usable address yet, the newest datagram replaces any held one.
        if let Some(record) = self.arp.get_mut(key) {
            if record.hold(buffer).is_some() {
                self.stats.arp.held_dropped += 1;
            }
        }

        let last = match expire {
            Expiration::When(last) => last,
            // A permanent entry without address, nothing to ask for.
            Expiration::Never => return Ok(Resolution::Queued),
        };
        let (asked, max_tries) = match self.arp.get(key) {
            Some(record) => (record.asked(), self.config.arp_max_tries),
            None => return Ok(Resolution::Queued),
        };
        if asked != 0 && last + self.config.arp_retry_interval > now {
            if let Some(route) = self.routes.get_mut(id) {
                route.flags.remove(RouteFlags::REJECT);
            }
            return Ok(Resolution::Queued);
        }

        let (ifaddr, interface) = match self.routes.get_mut(id) {
            Some(route) => {
                route.flags.remove(RouteFlags::REJECT);
                route.expire = Expiration::When(now);
                if asked >= max_tries {
                    route.flags.insert(RouteFlags::REJECT);
                    route.expire = Expiration::When(now + self.config.arp_reject_cooldown);
                }
                (route.ifaddr, route.interface)
            },
            None => return Ok(Resolution::Queued),
        };

        if asked < max_tries {
            if let Some(record) = self.arp.get_mut(key) {
                *record.asked_mut() += 1;
            }
            self.arp_request(interface, ifaddr, dst);
        } else {
            net_debug!("arp: {} does not answer, rejecting", dst);
            self.stats.arp.rejected += 1;
            if let Some(record) = self.arp.get_mut(key) {
                *record.asked_mut() = 0;
            }
        }
        Ok(Resolution::Queued)
    }

    /// Attach a resolution record to a host route.
    ///
    /// Evicts the least recently validated record that is not permanent when the cache is full.
    pub(crate) fn arp_attach(&mut self, id: RouteId) -> Option<usize> {
        if self.arp.len() >= self.config.arp_max_entries {
            let routes = &self.routes;
            let victim = self.arp.oldest_where(|record| {
                routes.get(record.route()).map_or(true, |route| !route.expire.is_never())
            });
            match victim.and_then(|key| self.arp.get(key)).map(|record| record.route()) {
                Some(victim) => {
                    net_debug!("arp: cache full, evicting {}", victim);
                    self.stats.arp.evicted += 1;
                    self.route_delete(victim);
                },
                None => net_debug!("arp: cache full of permanent entries"),
            }
        }

        let now = self.now;
        let key = self.arp.insert(id);
        let (dest, ifaddr, interface) = {
            let route = self.routes.get_mut(id)?;
            route.link_info = Some(key);
            route.flags.insert(RouteFlags::LLINFO);
            route.expire = Expiration::When(now);
            (route.dest.address(), route.ifaddr, route.interface)
        };

        if dest == ifaddr {
            // Our own address resolves to ourselves, permanently.
            let own = self.interfaces.get(interface.0).map(|iface| iface.hw_addr());
            if let Some(record) = self.arp.get_mut(key) {
                record.set_hardware_addr(own);
            }
            if let Some(route) = self.routes.get_mut(id) {
                route.expire = Expiration::Never;
            }
        }
        Some(key)
    }

    /// Find the record of a host, optionally creating the host route and record.
    pub(crate) fn arp_lookup(&mut self, addr: Ipv4Address, create: bool) -> Option<usize> {
        let id = self.route_lookup(addr, create)?;
        let route = self.routes.get(id)?;
        if route.flags.contains(RouteFlags::HOST | RouteFlags::LLINFO) && route.gateway.is_none() {
            return route.link_info();
        }
        if create {
            net_debug!("arp: cannot enter address for {}", addr);
        }
        None
    }

    /// Age the resolution records.
    ///
    /// Expired records lose their address, are rejected, and their host route is deleted.
    pub(crate) fn arp_timer(&mut self) {
        let now = self.now;
        for key in self.arp.keys() {
            let id = match self.arp.get(key) {
                Some(record) => record.route(),
                None => continue,
            };
            let expired = self.routes.get(id).map_or(false, |route| route.expire.is_reached(now));
            if !expired {
                continue;
            }
            if let Some(record) = self.arp.get_mut(key) {
                record.set_hardware_addr(None);
            }
            if let Some(route) = self.routes.get_mut(id) {
                route.flags.insert(RouteFlags::REJECT);
            }
            net_trace!("arp: {} expired", id);
            self.stats.arp.expired += 1;
            self.route_delete(id);
        }
    }

    /// Broadcast a request for our own address.
    pub(crate) fn arp_whohas(&mut self, interface: IfIndex, addr: Ipv4Address) {
        self.arp_request(interface, addr, addr)
    }

    fn arp_request(&mut self, interface: IfIndex, sip: Ipv4Address, tip: Ipv4Address) {
        let hw = match self.interfaces.get(interface.0) {
            Some(iface) => iface.hw_addr(),
            None => return,
        };
        let repr = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Request,
            source_hardware_addr: hw,
            source_protocol_addr: sip,
            target_hardware_addr: EthernetAddress::UNSPECIFIED,
            target_protocol_addr: tip,
        };
        net_trace!("arp: {}", repr);
        self.stats.arp.requests_sent += 1;
        let frame = Buffer::new(repr.to_vec());
        if let Err(err) = self.send_frame(interface, EthernetAddress::BROADCAST, EthernetProtocol::Arp, frame) {
            net_debug!("arp: request for {} not sent: {}", tip, err);
        }
    }

    fn process_arp(&mut self, mut frame: Buffer, interface: IfIndex) -> core::result::Result<(), DropReason> {
        let len = frame.len();
        if !frame.pullup(len) {
            return Err(DropReason::ArpMalformed);
        }
        let repr = arp_packet::new_checked(frame.head())
            .and_then(ArpRepr::parse)
            .map_err(|_| DropReason::ArpMalformed)?;
        let (op, sha, isaddr, mut itaddr) = match repr {
            ArpRepr::EthernetIpv4 {
                operation,
                source_hardware_addr,
                source_protocol_addr,
                target_protocol_addr,
                ..
            } => (operation, source_hardware_addr, source_protocol_addr, target_protocol_addr),
        };

        let iface = self.interfaces.get(interface.0).ok_or(DropReason::NoInterface)?;
        let own_hw = iface.hw_addr();
        let myaddr = iface.addrs().iter()
            .map(|ifa| ifa.address())
            .find(|&addr| addr == itaddr || addr == isaddr)
            .or_else(|| iface.addrs().last().map(|ifa| ifa.address()))
            .ok_or(DropReason::ArpNotForUs)?;

        if sha == own_hw {
            return Err(DropReason::ArpOwnFrame);
        }
        if !sha.is_unicast() {
            net_warn!("arp: ether address is broadcast or multicast for IP address {}!", isaddr);
            return Err(DropReason::ArpBroadcastSender);
        }

        let mut learned = false;
        if isaddr == myaddr {
            net_warn!("duplicate IP address {}! sent from ethernet address: {}", isaddr, sha);
            itaddr = myaddr;
        } else if let Some(key) = self.arp_lookup(isaddr, itaddr == myaddr) {
            self.arp_update(key, isaddr, sha);
            learned = true;
        }

        if op != ArpOperation::Request {
            return if learned { Ok(()) } else { Err(DropReason::ArpNotForUs) };
        }

        let reply_hw = if itaddr == myaddr {
            own_hw
        } else {
            let published = self.arp_lookup(itaddr, false)
                .and_then(|key| self.arp.get(key))
                .filter(|record| record.is_published())
                .map(|record| record.hardware_addr());
            match published {
                Some(Some(hw)) if !hw.is_unspecified() => hw,
                Some(_) => own_hw,
                None => return if learned { Ok(()) } else { Err(DropReason::ArpNotForUs) },
            }
        };

        let reply = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Reply,
            source_hardware_addr: reply_hw,
            source_protocol_addr: itaddr,
            target_hardware_addr: sha,
            target_protocol_addr: isaddr,
        };
        net_trace!("arp: {}", reply);
        self.stats.arp.replies_sent += 1;
        let frame = Buffer::new(reply.to_vec());
        if let Err(err) = self.send_frame(interface, sha, EthernetProtocol::Arp, frame) {
            net_debug!("arp: reply to {} not sent: {}", isaddr, err);
        }
        Ok(())
    }

    /// Store a learned mapping and send a held datagram.
    fn arp_update(&mut self, key: usize, isaddr: Ipv4Address, sha: EthernetAddress) {
        let now = self.now;
        let keep = self.config.arp_keep;
        let id = match self.arp.get_mut(key) {
            Some(record) => {
                if let Some(old) = record.hardware_addr() {
                    if old != sha {
                        net_warn!("arp info overwritten for {} by {}", isaddr, sha);
                    }
                }
                record.set_hardware_addr(Some(sha));
                *record.asked_mut() = 0;
                record.route()
            },
            None => return,
        };
        if let Some(route) = self.routes.get_mut(id) {
            if !route.expire.is_never() {
                route.expire = Expiration::When(now + keep);
            }
            route.flags.remove(RouteFlags::REJECT);
        }
        self.arp.touch(key);
        net_debug!("arp: {} is at {}", isaddr, sha);
        self.release_hold(key);
    }

    /// Send the datagram held by a record, now that it is resolved.
    fn release_hold(&mut self, key: usize) {
        let (id, held) = match self.arp.get_mut(key) {
            Some(record) => (record.route(), record.take_hold()),
            None => return,
        };
        let held = match held {
            Some(held) => held,
            None => return,
        };
        let (interface, dst) = match self.routes.get(id) {
            Some(route) => (route.interface, route.dest.address()),
            None => return,
        };
        if let Err(err) = self.if_output(interface, held, dst, Some(id)) {
            net_debug!("arp: held datagram for {} not sent: {}", dst, err);
        }
    }

    /// The hardware address of a destination on a link without address resolution.
    fn synthesize(own: EthernetAddress, dst: Ipv4Address) -> EthernetAddress {
        let lna = dst.to_network_integer();
        let own = own.0;
        EthernetAddress([
            own[0],
            own[1],
            own[2],
            ((lna >> 16) & 0x7f) as u8,
            (lna >> 8) as u8,
            lna as u8,
        ])
    }
}
