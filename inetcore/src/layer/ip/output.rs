//! The output path of datagrams, locally originated or forwarded.
//!
//! Relevant rfc791, rfc1112 section 6, rfc1122 section 3.3.3.
use crate::layer::{Error, Hooks, Result};
use crate::layer::ip::{MulticastOptions, OutputFlags, RouteCache, RouteFlags};
use crate::nic::{Flags as IfFlags, IfIndex, Interface};
use crate::stack::Stack;
use crate::storage::{Buffer, BufferFlags};
use crate::time::Instant;
use crate::wire::ipv4_option;
use crate::wire::{ipv4_packet, Ipv4Address, IPV4_HEADER_LEN};

/// Fragment payloads are multiples of this.
const FRAGMENT_UNIT: usize = 8;

impl<H: Hooks> Stack<H> {
    /// Send a locally originated datagram with default options.
    ///
    /// The datagram must be a complete IPv4 packet, the stack fills in version, identification and
    /// fragmentation fields, the source address if unspecified, and the checksum.
    pub fn send(&mut self, datagram: Buffer, now: Instant) -> Result<()> {
        self.output(datagram, None, OutputFlags::empty(), None, now)
    }

    /// Send a datagram.
    ///
    /// A `route` cache passed in is reused while valid and updated otherwise, the caller owns the
    /// reference it holds. Multicast datagrams are sent according to `moptions`, or with the
    /// defaults.
    pub fn output(
        &mut self,
        datagram: Buffer,
        route: Option<&mut RouteCache>,
        flags: OutputFlags,
        moptions: Option<&MulticastOptions>,
        now: Instant,
    ) -> Result<()> {
        self.set_time(now);
        self.ip_output(datagram, route, flags, moptions)
    }

    pub(crate) fn ip_output(
        &mut self,
        mut datagram: Buffer,
        route: Option<&mut RouteCache>,
        flags: OutputFlags,
        moptions: Option<&MulticastOptions>,
    ) -> Result<()> {
        if !datagram.pullup(IPV4_HEADER_LEN) {
            return Err(Error::BadSize);
        }
        let header_len = usize::from(ipv4_packet::new_unchecked(datagram.head()).header_len());
        if header_len < IPV4_HEADER_LEN || !datagram.pullup(header_len) {
            return Err(Error::BadSize);
        }

        if flags.intersects(OutputFlags::FORWARDING | OutputFlags::RAW_OUTPUT) {
            let total_len = usize::from(ipv4_packet::new_unchecked(datagram.head()).total_len());
            if total_len != datagram.len() {
                return Err(Error::BadSize);
            }
        } else {
            if datagram.len() > usize::from(u16::max_value()) {
                return Err(Error::MessageSize);
            }
            let ident = self.next_ip_id();
            let total_len = datagram.len() as u16;
            let default_ttl = self.config.default_ttl;
            let header = ipv4_packet::new_unchecked_mut(datagram.head_mut());
            if header.hop_limit() == 0 {
                header.set_hop_limit(default_ttl);
            }
            header.set_version(4);
            header.set_more_frags(false);
            header.set_frag_offset(0);
            header.set_ident(ident);
            header.set_total_len(total_len);
            self.stats.ip.local_out += 1;
        }

        match route {
            Some(cache) => self.output_routed(datagram, header_len, cache, flags, moptions),
            None => {
                let mut cache = RouteCache::new();
                let result = self.output_routed(datagram, header_len, &mut cache, flags, moptions);
                self.release_route(&mut cache);
                result
            },
        }
    }

    fn output_routed(
        &mut self,
        mut datagram: Buffer,
        header_len: usize,
        cache: &mut RouteCache,
        flags: OutputFlags,
        moptions: Option<&MulticastOptions>,
    ) -> Result<()> {
        let dst = ipv4_packet::new_unchecked(datagram.head()).dst_addr();

        // A cached route must be up and to the same destination.
        if let Some(id) = cache.route {
            if !self.routes.is_up(id) || cache.dst != Some(dst) {
                self.routes.release(id);
                cache.route = None;
            }
        }
        if cache.route.is_none() {
            cache.dst = Some(dst);
        }

        let multicast_if = moptions
            .filter(|_| dst.is_multicast())
            .and_then(|options| options.interface);
        let mut next_hop = dst;
        let (idx, ifaddr) = if flags.contains(OutputFlags::ROUTE_TO_IF) {
            let found = self.iface_with_peer(dst).or_else(|| self.iface_with_net(dst));
            let (idx, ifaddr) = match found {
                Some(found) => found,
                None => {
                    self.stats.ip.no_route += 1;
                    return Err(Error::Unreachable);
                },
            };
            ipv4_packet::new_unchecked_mut(datagram.head_mut()).set_hop_limit(1);
            (idx, ifaddr)
        } else if let Some(idx) = multicast_if {
            let ifaddr = self.interfaces.get(idx.0)
                .and_then(Interface::primary_addr)
                .unwrap_or(Ipv4Address::UNSPECIFIED);
            (idx, ifaddr)
        } else {
            if cache.route.is_none() {
                cache.route = self.route_lookup(dst, true);
                if let Some(id) = cache.route {
                    self.routes.hold(id);
                }
            }
            let route = match cache.route.and_then(|id| self.routes.get_mut(id)) {
                Some(route) => route,
                None => {
                    self.stats.ip.no_route += 1;
                    return Err(Error::Unreachable);
                },
            };
            route.use_count += 1;
            if let (true, Some(gateway)) = (route.flags.contains(RouteFlags::GATEWAY), route.gateway) {
                next_hop = gateway;
            }
            (route.interface, route.ifaddr)
        };

        let (if_flags, if_mtu, member, source, link_broadcast) = match self.interfaces.get(idx.0) {
            Some(iface) => (
                iface.flags(),
                iface.mtu_for(dst),
                iface.is_member(dst),
                iface.primary_addr().unwrap_or(Ipv4Address::UNSPECIFIED),
                iface.is_broadcast(next_hop),
            ),
            None => return Err(Error::NetDown),
        };

        if dst.is_multicast() {
            datagram.meta_mut().flags.insert(BufferFlags::MCAST);
            next_hop = dst;
            let ttl = self.multicast_ttl(moptions);
            if !if_flags.contains(IfFlags::MULTICAST) {
                self.stats.ip.no_route += 1;
                return Err(Error::Unreachable);
            }
            {
                let header = ipv4_packet::new_unchecked_mut(datagram.head_mut());
                header.set_hop_limit(ttl);
                if header.src_addr().is_unspecified() {
                    header.set_src_addr(source);
                }
            }

            if member && moptions.map_or(true, |options| options.loops) {
                self.loop_multicast(&datagram, header_len, idx);
            } else if self.hooks.is_multicast_router() && !flags.contains(OutputFlags::FORWARDING) {
                if self.hooks.mcast_forward(&datagram, Some(idx)).is_err() {
                    return Ok(());
                }
            }

            // Looped back above if at all, never sent with a zero time to live.
            if ttl == 0 || if_flags.contains(IfFlags::LOOPBACK) {
                return Ok(());
            }
        } else {
            {
                let header = ipv4_packet::new_unchecked_mut(datagram.head_mut());
                if header.src_addr().is_unspecified() {
                    header.set_src_addr(ifaddr);
                }
            }

            let broadcast = next_hop.is_broadcast() || next_hop.is_unspecified() || link_broadcast;
            if broadcast {
                if !if_flags.contains(IfFlags::BROADCAST) {
                    return Err(Error::AddrNotAvailable);
                }
                if !flags.contains(OutputFlags::ALLOW_BROADCAST) {
                    return Err(Error::Access);
                }
                if !self.config.fragment_broadcast && datagram.len() > if_mtu {
                    return Err(Error::MessageSize);
                }
                datagram.meta_mut().flags.insert(BufferFlags::BCAST);
            } else {
                datagram.meta_mut().flags.remove(BufferFlags::BCAST);
            }
        }

        let mtu = match cache.route.and_then(|id| self.routes.get(id)) {
            Some(route) if route.mtu != 0 && route.mtu < if_mtu => route.mtu,
            _ => if_mtu,
        };

        if datagram.len() <= mtu {
            self.finish_header(&mut datagram, header_len);
            return self.if_output(idx, datagram, next_hop, cache.route);
        }

        if ipv4_packet::new_unchecked(datagram.head()).dont_frag() {
            self.stats.ip.cant_frag += 1;
            if let Some(route) = cache.route.and_then(|id| self.routes.get_mut(id)) {
                if route.flags.contains(RouteFlags::HOST) && route.mtu > if_mtu {
                    route.mtu = if_mtu;
                }
            }
            return Err(Error::MessageSize);
        }

        let len = mtu.saturating_sub(header_len) & !(FRAGMENT_UNIT - 1);
        if len < FRAGMENT_UNIT {
            return Err(Error::MessageSize);
        }

        let fragments = self.fragment(datagram, header_len, len);
        self.stats.ip.out_fragments += fragments.len() as u64;

        let mut result = Ok(());
        for fragment in fragments {
            if result.is_ok() {
                result = self.if_output(idx, fragment, next_hop, cache.route);
            }
        }
        if result.is_ok() {
            self.stats.ip.fragmented += 1;
        }
        result
    }

    /// Split a datagram into fragments carrying `len` octets of data each, the last one less.
    ///
    /// Fragments after the first carry only the options that are copied on fragmentation.
    fn fragment(&mut self, mut datagram: Buffer, header_len: usize, len: usize) -> Vec<Buffer> {
        let total_len = datagram.len();
        let meta = datagram.meta();
        let (base_offset, more) = {
            let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
            (usize::from(header.frag_offset()), header.more_frags())
        };

        let mut fragment_header = datagram.copy_range(0, IPV4_HEADER_LEN);
        {
            let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
            fragment_header.extend(ipv4_option::copy_for_fragment(header.options()));
        }
        let mhlen = fragment_header.len();

        let mut fragments = Vec::with_capacity(1 + (total_len - header_len) / len);
        let mut off = header_len + len;
        while off < total_len {
            let flen = len.min(total_len - off);
            let mut header = fragment_header.clone();
            {
                let packet = ipv4_packet::new_unchecked_mut(&mut header);
                packet.set_header_len(mhlen as u8);
                packet.set_frag_offset((base_offset + off - header_len) as u16);
                packet.set_more_frags(more || off + flen < total_len);
                packet.set_total_len((mhlen + flen) as u16);
            }
            let mut fragment = Buffer::new(header).with_meta(meta);
            fragment.append(datagram.copy_segment(off, flen));
            self.finish_header(&mut fragment, mhlen);
            fragments.push(fragment);
            off += len;
        }

        datagram.truncate(header_len + len);
        {
            let header = ipv4_packet::new_unchecked_mut(datagram.head_mut());
            header.set_total_len((header_len + len) as u16);
            header.set_more_frags(true);
        }
        self.finish_header(&mut datagram, header_len);
        fragments.insert(0, datagram);
        fragments
    }

    /// Loop a copy of a multicast datagram back to this host.
    fn loop_multicast(&mut self, datagram: &Buffer, header_len: usize, idx: IfIndex) {
        let mut copy = datagram.duplicate();
        self.finish_header(&mut copy, header_len);
        self.loop_input(copy, idx);
    }

    fn finish_header(&self, datagram: &mut Buffer, header_len: usize) {
        let header = ipv4_packet::new_unchecked_mut(&mut datagram.head_mut()[..header_len]);
        header.set_checksum(0);
        if self.config.checksum_tx.manual() {
            header.fill_checksum();
        }
    }
}
