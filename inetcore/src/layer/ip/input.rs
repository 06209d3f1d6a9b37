//! The input path of received datagrams.
//!
//! Relevant rfc791, rfc1122 section 3.2.1.
use crate::layer::{Hooks, IcmpError, Verdict};
use crate::layer::ip::InPacket;
use crate::nic::{Flags as IfFlags, IfIndex};
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::Buffer;
use crate::time::Instant;
use crate::wire::{ipv4_packet, IpProtocol, Ipv4Address, IPV4_HEADER_LEN};

impl<H: Hooks> Stack<H> {
    /// Process a datagram received on `interface`.
    ///
    /// `datagram` holds the IPv4 packet without the link header. Its metadata tells whether it
    /// arrived as a link-layer broadcast or multicast.
    pub fn ip_input(&mut self, datagram: Buffer, interface: IfIndex, now: Instant) {
        self.set_time(now);
        self.stats.ip.total += 1;
        if let Err(reason) = self.process_datagram(datagram, interface) {
            net_trace!("ip: dropped datagram on {}: {}", interface, reason);
            self.stats.drops.record(reason);
        }
    }

    fn process_datagram(&mut self, mut datagram: Buffer, interface: IfIndex) -> Result<(), DropReason> {
        if !self.interfaces.contains(interface.0) {
            return Err(DropReason::NoInterface);
        }
        datagram.meta_mut().interface = Some(interface);

        let header_len = self.validate(&mut datagram)?;

        let mut datagram = match self.hooks.filter(datagram, interface) {
            Verdict::Pass(datagram) => datagram,
            Verdict::Drop => return Err(DropReason::Filtered),
        };
        // The filter may have rewritten the datagram.
        if !datagram.pullup(header_len) {
            self.stats.ip.bad_header_len += 1;
            return Err(DropReason::BadHeaderLen);
        }

        if header_len > IPV4_HEADER_LEN {
            datagram = match self.handle_options(datagram, header_len, interface)? {
                Some(datagram) => datagram,
                None => return Ok(()),
            };
        }

        let datagram = match self.destination(datagram, interface)? {
            Some(datagram) => datagram,
            None => return Ok(()),
        };

        let (datagram, header_len) = match self.reassemble(datagram, header_len)? {
            Some(complete) => complete,
            None => return Ok(()),
        };

        self.deliver(datagram, header_len, interface)
    }

    /// Check the header, returning its length.
    ///
    /// Data beyond the total length, link-layer padding, is trimmed.
    fn validate(&mut self, datagram: &mut Buffer) -> Result<usize, DropReason> {
        if !datagram.pullup(IPV4_HEADER_LEN) {
            self.stats.ip.too_small += 1;
            return Err(DropReason::TooSmall);
        }

        let (version, header_len) = {
            let header = ipv4_packet::new_unchecked(datagram.head());
            (header.version(), usize::from(header.header_len()))
        };
        if version != 4 {
            self.stats.ip.bad_version += 1;
            return Err(DropReason::BadVersion);
        }
        if header_len < IPV4_HEADER_LEN || !datagram.pullup(header_len) {
            self.stats.ip.bad_header_len += 1;
            return Err(DropReason::BadHeaderLen);
        }

        let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
        if self.config.checksum_rx.manual() && !header.verify_checksum() {
            self.stats.ip.bad_checksum += 1;
            return Err(DropReason::BadChecksum);
        }

        let total_len = usize::from(header.total_len());
        if total_len < header_len {
            self.stats.ip.bad_len += 1;
            return Err(DropReason::BadLen);
        }
        if datagram.len() < total_len {
            self.stats.ip.too_short += 1;
            return Err(DropReason::TooShort);
        }
        datagram.truncate(total_len);
        Ok(header_len)
    }

    /// Decide whether the datagram is for us.
    ///
    /// Returns the datagram if so, forwards it otherwise.
    fn destination(&mut self, datagram: Buffer, interface: IfIndex) -> Result<Option<Buffer>, DropReason> {
        let dst = ipv4_packet::new_unchecked(datagram.head()).dst_addr();

        if self.is_local(dst) {
            return Ok(Some(datagram));
        }
        if let Some(iface) = self.interfaces.get(interface.0) {
            if iface.flags().contains(IfFlags::BROADCAST) && iface.is_broadcast(dst) {
                return Ok(Some(datagram));
            }
        }

        if dst.is_multicast() {
            self.multicast_destination(&datagram, interface, dst)?;
            return Ok(Some(datagram));
        }

        if dst.is_broadcast() || dst.is_unspecified() {
            return Ok(Some(datagram));
        }

        if !self.config.forwarding {
            self.stats.ip.cant_forward += 1;
            return Err(DropReason::NotForUs);
        }
        self.ip_forward(datagram, interface, false);
        Ok(None)
    }

    /// Accept a multicast datagram for a group joined on the receiving interface.
    ///
    /// A multicast router sees every multicast datagram first.
    fn multicast_destination(&mut self, datagram: &Buffer, interface: IfIndex, dst: Ipv4Address)
        -> Result<(), DropReason>
    {
        let protocol = ipv4_packet::new_unchecked(datagram.head()).protocol();

        if self.hooks.is_multicast_router() {
            if self.hooks.mcast_forward(datagram, Some(interface)).is_err() {
                self.stats.ip.cant_forward += 1;
                return Err(DropReason::CantForward);
            }
            // Group management messages are always for us, the router needs them.
            if protocol == IpProtocol::Igmp {
                return Ok(());
            }
            self.stats.ip.forward += 1;
        }

        let member = self.interfaces.get(interface.0)
            .map_or(false, |iface| iface.is_member(dst));
        if !member {
            self.stats.ip.cant_forward += 1;
            return Err(DropReason::CantForward);
        }
        Ok(())
    }

    /// Pass a datagram through reassembly.
    ///
    /// Returns the complete datagram, or nothing while fragments are missing.
    fn reassemble(&mut self, datagram: Buffer, header_len: usize)
        -> Result<Option<(Buffer, usize)>, DropReason>
    {
        let (fragment, more, payload_len) = {
            let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
            (header.is_fragment(), header.more_frags(), datagram.len() - header_len)
        };

        if !fragment {
            let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
            if self.reass.discard(header) {
                net_trace!("unfragmented datagram replaced a reassembly queue");
            }
            return Ok(Some((datagram, header_len)));
        }

        if more && (payload_len == 0 || payload_len % 8 != 0) {
            self.stats.ip.bad_fragments += 1;
            return Err(DropReason::BadFragment);
        }

        self.stats.ip.fragments += 1;
        match self.reass.insert(datagram, header_len, self.config.frag_ttl) {
            Ok(Some(complete)) => {
                self.stats.ip.reassembled += 1;
                Ok(Some(complete))
            },
            Ok(None) => Ok(None),
            Err(DropReason::TooLong) => {
                self.stats.ip.too_long += 1;
                Err(DropReason::TooLong)
            },
            Err(reason) => {
                self.stats.ip.frag_dropped += 1;
                Err(reason)
            },
        }
    }

    fn deliver(&mut self, datagram: Buffer, header_len: usize, interface: IfIndex) -> Result<(), DropReason> {
        let protocol = u8::from(ipv4_packet::new_unchecked(datagram.head()).protocol());
        match self.protocols.get_mut(&protocol) {
            Some(handler) => {
                self.stats.ip.delivered += 1;
                handler.receive(InPacket { datagram, header_len, interface });
                Ok(())
            },
            None => {
                self.stats.ip.no_proto += 1;
                self.hooks.icmp_error(datagram, IcmpError::ProtocolUnreachable);
                Err(DropReason::NoProtocol)
            },
        }
    }

    /// Age the reassembly queues by one tick.
    pub(crate) fn reass_timer(&mut self) {
        let expired = self.reass.slow_timeout();
        self.stats.ip.frag_timeout += expired;
        self.stats.drops.record_many(DropReason::FragmentTimeout, expired);
    }
}
