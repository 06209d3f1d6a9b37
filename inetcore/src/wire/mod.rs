/*! Low-level packet access and construction.

# An overview over packet representations

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structures e.g. [`ipv4_packet`] or
   [`arp_packet`].
 * Second, it provides a compact, high-level representation of header data that can be created from
   parsing and emitted into a sequence of octets. This happens through the `Repr` structures, e.g.
   [`ArpRepr`]. IPv4 headers carry options and fragment state that the pipelines rewrite in place,
   so they are only handled through the byte view.

[`ipv4_packet`]: struct.ipv4_packet.html
[`arp_packet`]: struct.arp_packet.html
[`ArpRepr`]: enum.ArpRepr.html

All multi-octet fields are kept in network byte order inside the byte views. Accessors convert on
every read and write, there is no separate host order copy of a header. The input pipeline is the
only place that decides whether a header is to be trusted, by checking its length, version and
checksum before looking at any other field.

The `packet::new_checked` constructors guarantee that, if they returned `Ok(_)`, then no field
accessor or setter method will panic; however, the guarantee only holds while the length fields
are not mutated.

The `Repr::parse()` method never panics and the `Repr::emit()` method never panics as long as the
underlying buffer is at least `Repr::buffer_len()` octets long.

# Examples

To emit an ARP request into an octet buffer, and then parse it back:

```rust
use inetcore::wire::*;
let repr = ArpRepr::EthernetIpv4 {
    operation:              ArpOperation::Request,
    source_hardware_addr:   EthernetAddress([0x02, 0, 0, 0, 0, 1]),
    source_protocol_addr:   Ipv4Address::new(10, 0, 0, 1),
    target_hardware_addr:   EthernetAddress::UNSPECIFIED,
    target_protocol_addr:   Ipv4Address::new(10, 0, 0, 2),
};
let mut buffer = vec![0; repr.buffer_len()];
{ // emission
    let packet = arp_packet::new_unchecked_mut(&mut buffer);
    repr.emit(packet);
}
{ // parsing
    let packet = arp_packet::new_checked(&buffer)
        .expect("truncated packet");
    let parsed = ArpRepr::parse(packet)
        .expect("malformed packet");
    assert_eq!(repr, parsed);
}
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod arp;
pub mod checksum;
mod error;
mod ethernet;
mod ipv4;

/// Whether a checksum is computed by the library or left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled or checked by the NIC.
    Ignored,
}

impl Checksum {
    /// Check if a checksum should be calculated by the library.
    ///
    /// Otherwise it is ignored due to the assumption that it was offloaded or is otherwise
    /// undesirable to check.
    pub fn manual(self) -> bool {
        match self {
            Checksum::Manual => true,
            Checksum::Ignored => false,
        }
    }
}

pub use self::error::{Error, Result};

pub use self::ethernet::{
    Address as EthernetAddress,
    EtherType as EthernetProtocol,
    ParseAddressError as EthernetParseError};

pub use self::arp::{
    arp as arp_packet,
    Hardware as ArpHardware,
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ipv4::{
    Address as Ipv4Address,
    Cidr as Ipv4Cidr,
    Subnet as Ipv4Subnet,
    ipv4 as ipv4_packet,
    Protocol as IpProtocol,
    HEADER_LEN as IPV4_HEADER_LEN,
    MAX_HEADER_LEN as IPV4_MAX_HEADER_LEN,
    MAX_PACKET_LEN as IPV4_MAX_PACKET_LEN};

pub mod ipv4_option {
    //! Constants and helpers for IPv4 header options.
    pub use super::ipv4::option::*;
}
