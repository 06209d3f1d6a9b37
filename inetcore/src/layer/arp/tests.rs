use crate::config::Config;
use crate::layer::Error;
use crate::layer::arp::Flags as ArpFlags;
use crate::nic::{Flags as IfFlags, Frame, IfAddr, Interface, Loopback};
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::Buffer;
use crate::testing::*;
use crate::time::{Duration, Expiration, Instant};
use crate::wire::{arp_packet, ipv4_packet, ArpOperation, ArpRepr};
use crate::wire::{EthernetAddress, EthernetProtocol, Ipv4Address, Ipv4Cidr, Ipv4Subnet};

const NOW: Instant = Instant { millis: 0 };

fn parse_arp(frame: &Frame) -> ArpRepr {
    assert_eq!(frame.ethertype, EthernetProtocol::Arp);
    let bytes = frame.payload.to_vec();
    ArpRepr::parse(arp_packet::new_checked(&bytes).unwrap()).unwrap()
}

fn payload_of(frame: &Frame) -> Vec<u8> {
    assert_eq!(frame.ethertype, EthernetProtocol::Ipv4);
    let bytes = frame.payload.to_vec();
    let header_len = usize::from(ipv4_packet::new_unchecked(&bytes).header_len());
    bytes[header_len..].to_vec()
}

fn request(tpa: Ipv4Address) -> ArpRepr {
    ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Request,
        source_hardware_addr: HOST_HW,
        source_protocol_addr: HOST,
        target_hardware_addr: EthernetAddress::UNSPECIFIED,
        target_protocol_addr: tpa,
    }
}

#[test]
fn resolve_and_send() {
    let (mut stack, idx, tap) = host();

    stack.send(Buffer::new(datagram(HOST, PEER, b"first")), NOW).unwrap();
    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, EthernetAddress::BROADCAST);
    assert_eq!(parse_arp(&frame), request(PEER));
    assert!(tap.is_empty());

    let entry = stack.arp_get(PEER).unwrap();
    assert_eq!(entry.hardware_addr, None);
    assert_eq!(entry.flags, ArpFlags::empty());
    assert_eq!(entry.interface, idx);

    stack.arp_input(
        arp(ArpOperation::Reply, PEER_HW, PEER, HOST_HW, HOST),
        idx,
        NOW);
    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, PEER_HW);
    assert_eq!(payload_of(&frame), b"first".to_vec());

    let entry = stack.arp_get(PEER).unwrap();
    assert_eq!(entry.hardware_addr, Some(PEER_HW));
    assert_eq!(entry.flags, ArpFlags::COMPLETE);
    assert_eq!(entry.expires, Expiration::When(NOW + Duration::from_secs(20 * 60)));

    // Resolved, no further requests.
    stack.send(Buffer::new(datagram(HOST, PEER, b"second")), NOW).unwrap();
    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, PEER_HW);
    assert_eq!(payload_of(&frame), b"second".to_vec());
    assert_eq!(stack.stats().arp.requests_sent, 1);
    assert_eq!(stack.stats().arp.received, 1);
}

#[test]
fn single_pending_datagram() {
    let (mut stack, idx, tap) = host();

    for payload in &[b"a", b"b", b"c"] {
        stack.send(Buffer::new(datagram(HOST, PEER, &payload[..])), NOW).unwrap();
    }
    assert_eq!(tap.len(), 1);
    assert_eq!(stack.stats().arp.requests_sent, 1);
    assert_eq!(stack.stats().arp.held_dropped, 2);
    tap.drain();

    stack.arp_input(arp(ArpOperation::Reply, PEER_HW, PEER, HOST_HW, HOST), idx, NOW);
    let frames = tap.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(payload_of(&frames[0]), b"c".to_vec());
}

#[test]
fn retry_ceiling() {
    let (mut stack, _, tap) = host();

    for secs in 0..5 {
        stack.send(Buffer::new(datagram(HOST, PEER, b"")), Instant::from_secs(secs)).unwrap();
    }
    assert_eq!(stack.stats().arp.requests_sent, 5);

    // Within the retry interval nothing is sent.
    stack.send(Buffer::new(datagram(HOST, PEER, b"")), Instant::from_millis(4500)).unwrap();
    assert_eq!(stack.stats().arp.requests_sent, 5);

    stack.send(Buffer::new(datagram(HOST, PEER, b"")), Instant::from_secs(5)).unwrap();
    assert_eq!(stack.stats().arp.requests_sent, 5);
    assert_eq!(stack.stats().arp.rejected, 1);

    let result = stack.send(Buffer::new(datagram(HOST, PEER, b"")), Instant::from_secs(6));
    assert_eq!(result, Err(Error::HostDown));
    assert_eq!(tap.len(), 5);

    // After the cooldown, asking starts over.
    stack.send(Buffer::new(datagram(HOST, PEER, b"")), Instant::from_secs(26)).unwrap();
    assert_eq!(stack.stats().arp.requests_sent, 6);
}

#[test]
fn unresolved_gateway() {
    let (mut stack, _, _) = host();
    let gateway = Ipv4Address::new(10, 0, 0, 3);
    let far = Ipv4Address::new(10, 0, 2, 5);
    stack.add_route(Ipv4Subnet::new(Ipv4Address::new(10, 0, 2, 0), 24), gateway).unwrap();

    for secs in 0..6 {
        stack.send(Buffer::new(datagram(HOST, far, b"")), Instant::from_secs(secs)).unwrap();
    }
    assert_eq!(stack.stats().arp.rejected, 1);
    assert!(stack.arp_get(gateway).is_some());

    let result = stack.send(Buffer::new(datagram(HOST, far, b"")), Instant::from_secs(6));
    assert_eq!(result, Err(Error::HostUnreachable));
}

#[test]
fn answers_requests() {
    let (mut stack, idx, tap) = host();

    stack.arp_input(
        arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, HOST),
        idx,
        NOW);

    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, PEER_HW);
    assert_eq!(parse_arp(&frame), ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Reply,
        source_hardware_addr: HOST_HW,
        source_protocol_addr: HOST,
        target_hardware_addr: PEER_HW,
        target_protocol_addr: PEER,
    });
    assert_eq!(stack.stats().arp.replies_sent, 1);
    // The requester is learned on the way.
    assert_eq!(stack.arp_get(PEER).unwrap().hardware_addr, Some(PEER_HW));
}

#[test]
fn learns_only_when_targeted() {
    let (mut stack, idx, tap) = host();

    stack.arp_input(
        arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, Ipv4Address::new(10, 0, 0, 9)),
        idx,
        NOW);
    assert!(tap.is_empty());
    assert!(stack.arp_get(PEER).is_none());
    assert_eq!(stack.stats().drops.get(DropReason::ArpNotForUs), 1);

    // An existing record is refreshed by any frame.
    stack.send(Buffer::new(datagram(HOST, PEER, b"")), NOW).unwrap();
    tap.drain();
    stack.arp_input(
        arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, Ipv4Address::new(10, 0, 0, 9)),
        idx,
        NOW);
    assert_eq!(stack.arp_get(PEER).unwrap().hardware_addr, Some(PEER_HW));
}

#[test]
fn ignores_own_frames() {
    let (mut stack, idx, tap) = host();

    stack.arp_input(
        arp(ArpOperation::Request, HOST_HW, PEER, EthernetAddress::UNSPECIFIED, HOST),
        idx,
        NOW);
    stack.arp_input(
        arp(ArpOperation::Request, EthernetAddress::BROADCAST, PEER, EthernetAddress::UNSPECIFIED, HOST),
        idx,
        NOW);

    assert!(tap.is_empty());
    assert!(stack.arp_get(PEER).is_none());
    assert_eq!(stack.stats().drops.get(DropReason::ArpOwnFrame), 1);
    assert_eq!(stack.stats().drops.get(DropReason::ArpBroadcastSender), 1);
}

#[test]
fn ignores_multicast_sender() {
    let (mut stack, idx, tap) = host();
    let group_hw = EthernetAddress([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);

    stack.send(Buffer::new(datagram(HOST, PEER, b"held")), NOW).unwrap();
    tap.drain();

    stack.arp_input(arp(ArpOperation::Reply, group_hw, PEER, HOST_HW, HOST), idx, NOW);
    assert!(tap.is_empty());
    assert_eq!(stack.arp_get(PEER).unwrap().hardware_addr, None);
    assert_eq!(stack.stats().drops.get(DropReason::ArpBroadcastSender), 1);

    // The datagram is still held for a proper reply.
    stack.arp_input(arp(ArpOperation::Reply, PEER_HW, PEER, HOST_HW, HOST), idx, NOW);
    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, PEER_HW);
    assert_eq!(payload_of(&frame), b"held".to_vec());
}

#[test]
fn duplicate_address() {
    let (mut stack, idx, tap) = host();

    stack.arp_input(
        arp(ArpOperation::Request, PEER_HW, HOST, EthernetAddress::UNSPECIFIED, HOST),
        idx,
        NOW);

    // Defend the address.
    let frame = tap.pop().unwrap();
    let reply = parse_arp(&frame);
    assert_eq!(reply, ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Reply,
        source_hardware_addr: HOST_HW,
        source_protocol_addr: HOST,
        target_hardware_addr: PEER_HW,
        target_protocol_addr: HOST,
    });
}

#[test]
fn mapping_overwritten() {
    let (mut stack, idx, _) = host();
    let other = EthernetAddress([0x02, 0, 0, 0, 0, 0x99]);

    stack.arp_input(arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, HOST), idx, NOW);
    stack.arp_input(arp(ArpOperation::Reply, other, PEER, HOST_HW, HOST), idx, NOW);
    assert_eq!(stack.arp_get(PEER).unwrap().hardware_addr, Some(other));
}

#[test]
fn proxy_entries() {
    let (mut stack, idx, tap) = host();
    let proxied = Ipv4Address::new(10, 0, 0, 50);
    let published = Ipv4Address::new(10, 0, 0, 51);
    let published_hw = EthernetAddress([0x02, 0, 0, 0, 0, 0x51]);

    stack.arp_set(proxied, EthernetAddress::UNSPECIFIED, ArpFlags::PUBLISHED | ArpFlags::PERMANENT).unwrap();
    stack.arp_set(published, published_hw, ArpFlags::PUBLISHED).unwrap();
    assert_eq!(
        stack.arp_get(proxied).unwrap().flags,
        ArpFlags::COMPLETE | ArpFlags::PERMANENT | ArpFlags::PUBLISHED);

    stack.arp_input(arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, proxied), idx, NOW);
    match parse_arp(&tap.pop().unwrap()) {
        ArpRepr::EthernetIpv4 { operation, source_hardware_addr, source_protocol_addr, .. } => {
            assert_eq!(operation, ArpOperation::Reply);
            assert_eq!(source_hardware_addr, HOST_HW);
            assert_eq!(source_protocol_addr, proxied);
        },
    }

    stack.arp_input(arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, published), idx, NOW);
    match parse_arp(&tap.pop().unwrap()) {
        ArpRepr::EthernetIpv4 { source_hardware_addr, source_protocol_addr, .. } => {
            assert_eq!(source_hardware_addr, published_hw);
            assert_eq!(source_protocol_addr, published);
        },
    }
    assert_eq!(stack.stats().arp.replies_sent, 2);
}

#[test]
fn table_management() {
    let (mut stack, _, _) = host();

    assert_eq!(
        stack.arp_set(Ipv4Address::new(192, 168, 0, 1), PEER_HW, ArpFlags::PERMANENT),
        Err(Error::Unreachable));

    stack.arp_set(PEER, PEER_HW, ArpFlags::PERMANENT).unwrap();
    let entry = stack.arp_get(PEER).unwrap();
    assert_eq!(entry.flags, ArpFlags::COMPLETE | ArpFlags::PERMANENT);
    assert_eq!(entry.expires, Expiration::Never);

    stack.arp_delete(PEER).unwrap();
    assert!(stack.arp_get(PEER).is_none());
    assert_eq!(stack.arp_delete(PEER), Err(Error::AddrNotAvailable));
    assert!(stack.arp_cache().is_empty());
}

#[test]
fn expiry() {
    let (mut stack, idx, _) = host();
    let kept = Ipv4Address::new(10, 0, 0, 7);
    stack.arp_set(kept, PEER_HW, ArpFlags::PERMANENT).unwrap();
    stack.arp_input(arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, HOST), idx, NOW);
    assert!(stack.arp_get(PEER).is_some());

    stack.poll_timers(NOW);
    stack.poll_timers(Instant::from_secs(15 * 60));
    assert!(stack.arp_get(PEER).is_some());
    stack.poll_timers(Instant::from_secs(21 * 60));

    assert!(stack.arp_get(PEER).is_none());
    assert!(stack.arp_get(kept).is_some());
    assert_eq!(stack.stats().arp.expired, 1);
    assert_eq!(stack.arp_cache().len(), 1);
}

#[test]
fn eviction() {
    let mut config = Config::default();
    config.arp_max_entries = 2;
    let (mut stack, _, _) = host_with(config);
    let first = Ipv4Address::new(10, 0, 0, 2);
    let second = Ipv4Address::new(10, 0, 0, 3);
    let third = Ipv4Address::new(10, 0, 0, 4);

    stack.send(Buffer::new(datagram(HOST, first, b"")), NOW).unwrap();
    stack.send(Buffer::new(datagram(HOST, second, b"")), NOW).unwrap();
    stack.send(Buffer::new(datagram(HOST, third, b"")), NOW).unwrap();

    assert_eq!(stack.arp_cache().len(), 2);
    assert_eq!(stack.stats().arp.evicted, 1);
    assert_eq!(stack.stats().arp.held_dropped, 1);
    assert!(stack.arp_get(first).is_none());
    assert!(stack.arp_get(second).is_some());
    assert!(stack.arp_get(third).is_some());
}

#[test]
fn gratuitous_request() {
    let (mut stack, idx, tap) = host();
    let added = Ipv4Address::new(10, 0, 5, 1);
    stack.add_address(idx, IfAddr::new(Ipv4Cidr::new(added, 24))).unwrap();
    assert_eq!(parse_arp(&tap.pop().unwrap()), ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Request,
        source_hardware_addr: HOST_HW,
        source_protocol_addr: added,
        target_hardware_addr: EthernetAddress::UNSPECIFIED,
        target_protocol_addr: added,
    });
    assert_eq!(
        stack.add_address(idx, IfAddr::new(Ipv4Cidr::new(added, 24))),
        Err(Error::AddrInUse));

    stack.announce(idx);
    assert_eq!(tap.len(), 2);
}

#[test]
fn without_address_resolution() {
    let mut stack = Stack::new(Config::default());
    let device = Loopback::new();
    let tap = device.tap();
    let iface = Interface::new("eth0", HOST_HW, 1500, device)
        .with_flags(IfFlags::UP | IfFlags::BROADCAST | IfFlags::NOARP)
        .with_addr(IfAddr::new(Ipv4Cidr::new(HOST, 24)));
    stack.attach(iface);

    stack.send(Buffer::new(datagram(HOST, PEER, b"direct")), NOW).unwrap();
    let frame = tap.pop().unwrap();
    assert_eq!(frame.dst_hw, EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]));
    assert!(stack.arp_cache().is_empty());
}

#[test]
fn detach_releases_records() {
    let (mut stack, idx, _) = host();
    stack.send(Buffer::new(datagram(HOST, PEER, b"held")), NOW).unwrap();
    assert_eq!(stack.arp_cache().len(), 1);

    assert!(stack.detach(idx).is_some());
    assert!(stack.arp_cache().is_empty());
    assert_eq!(stack.routes().iter().count(), 0);
    assert_eq!(stack.stats().arp.held_dropped, 1);
}
