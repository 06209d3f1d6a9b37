//! Packet builders and recording collaborators shared by the layer tests.
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::layer::{Hooks, IcmpError, Result};
use crate::layer::ip::{InPacket, Recv};
use crate::nic::{IfAddr, IfIndex, Interface, Loopback, Tap};
use crate::stack::Stack;
use crate::storage::Buffer;
use crate::wire::{ipv4_packet, ArpOperation, ArpRepr, EthernetAddress};
use crate::wire::{IpProtocol, Ipv4Address, Ipv4Cidr, IPV4_HEADER_LEN};

pub(crate) const HOST_HW: EthernetAddress = EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub(crate) const PEER_HW: EthernetAddress = EthernetAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
pub(crate) const HOST: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
pub(crate) const PEER: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);

/// A test protocol number, unassigned.
pub(crate) const PROTO: IpProtocol = IpProtocol::Unknown(0xfd);

/// A broadcast capable interface with one address in a /24.
pub(crate) fn ethernet(name: &str, hw: EthernetAddress, addr: Ipv4Address, mtu: usize) -> (Interface, Tap) {
    let device = Loopback::new();
    let tap = device.tap();
    let iface = Interface::new(name, hw, mtu, device)
        .with_addr(IfAddr::new(Ipv4Cidr::new(addr, 24)));
    (iface, tap)
}

/// A stack with hooks and a single ethernet interface at `HOST`.
pub(crate) fn host_with(config: Config) -> (Stack<Recorder>, IfIndex, Tap) {
    let mut stack = Stack::with_hooks(config, Recorder::default());
    let (iface, tap) = ethernet("eth0", HOST_HW, HOST, 1500);
    let idx = stack.attach(iface);
    (stack, idx, tap)
}

pub(crate) fn host() -> (Stack<Recorder>, IfIndex, Tap) {
    host_with(Config::default())
}

/// A complete datagram with options.
pub(crate) fn datagram_with_options(
    src: Ipv4Address,
    dst: Ipv4Address,
    options: &[u8],
    payload: &[u8],
) -> Vec<u8> {
    assert_eq!(options.len() % 4, 0);
    let header_len = IPV4_HEADER_LEN + options.len();
    let mut bytes = vec![0; header_len + payload.len()];
    {
        let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
        packet.set_version(4);
        packet.set_header_len(header_len as u8);
        packet.set_total_len((header_len + payload.len()) as u16);
        packet.set_ident(0x1234);
        packet.set_hop_limit(64);
        packet.set_protocol(PROTO);
        packet.set_src_addr(src);
        packet.set_dst_addr(dst);
        packet.options_mut().copy_from_slice(options);
        packet.fill_checksum();
    }
    bytes[header_len..].copy_from_slice(payload);
    bytes
}

pub(crate) fn datagram(src: Ipv4Address, dst: Ipv4Address, payload: &[u8]) -> Vec<u8> {
    datagram_with_options(src, dst, &[], payload)
}

/// One fragment of a datagram with ident `0x1234`, `offset` in octets.
pub(crate) fn fragment(
    src: Ipv4Address,
    dst: Ipv4Address,
    offset: usize,
    more: bool,
    data: &[u8],
) -> Vec<u8> {
    let mut bytes = datagram(src, dst, data);
    let packet = ipv4_packet::new_unchecked_mut(&mut bytes);
    packet.set_frag_offset(offset as u16);
    packet.set_more_frags(more);
    packet.fill_checksum();
    bytes
}

/// An ARP packet from `sha`/`spa` to `tpa`.
pub(crate) fn arp(
    operation: ArpOperation,
    sha: EthernetAddress,
    spa: Ipv4Address,
    tha: EthernetAddress,
    tpa: Ipv4Address,
) -> Buffer {
    Buffer::new(ArpRepr::EthernetIpv4 {
        operation,
        source_hardware_addr: sha,
        source_protocol_addr: spa,
        target_hardware_addr: tha,
        target_protocol_addr: tpa,
    }.to_vec())
}

/// A protocol handler keeping what it receives.
#[derive(Clone, Default)]
pub(crate) struct Sink(Arc<Mutex<Vec<InPacket>>>);

impl Sink {
    pub(crate) fn take(&self) -> Vec<InPacket> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Recv for Sink {
    fn receive(&mut self, packet: InPacket) {
        self.0.lock().unwrap().push(packet);
    }
}

/// Hooks recording the ICMP errors and acting as a multicast router on request.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) icmp: Vec<(IcmpError, Vec<u8>)>,
    pub(crate) router: bool,
    pub(crate) mcast_forwarded: usize,
}

impl Hooks for Recorder {
    fn icmp_error(&mut self, original: Buffer, error: IcmpError) {
        self.icmp.push((error, original.to_vec()));
    }

    fn is_multicast_router(&self) -> bool {
        self.router
    }

    fn mcast_forward(&mut self, _: &Buffer, _: Option<IfIndex>) -> Result<()> {
        self.mcast_forwarded += 1;
        Ok(())
    }
}
