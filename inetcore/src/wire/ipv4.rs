use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::checksum;

/// Length of an IPv4 header without options.
pub const HEADER_LEN: usize = 20;

/// Longest possible IPv4 header, limited by the four bit header length field.
pub const MAX_HEADER_LEN: usize = 60;

/// Longest possible IPv4 datagram, limited by the total length field.
pub const MAX_PACKET_LEN: usize = 65535;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp      = 0x01,
        Igmp      = 0x02,
        Tcp       = 0x06,
        Udp       = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Igmp        => write!(f, "IGMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED:           Address = Address([0x00; 4]);

    /// The broadcast address.
    pub const BROADCAST:             Address = Address([0xff; 4]);

    /// All multicast-capable nodes
    pub const MULTICAST_ALL_SYSTEMS: Address = Address([224, 0, 0, 1]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Decode a network endian `u32` into an address.
    pub fn from_network_integer(num: u32) -> Self {
        Address(num.to_be_bytes())
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast() ||
          self.is_unspecified())
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0[0..4] == [255; 4]
    }

    /// Query whether the address is a multicast address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 224
    }

    /// Query whether the address is the all-zero address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Query whether the address is on the network zero, `0.0.0.0/8`.
    pub fn is_net_zero(&self) -> bool {
        self.0[0] == 0
    }

    /// Query whether the address falls into the reserved class E, `240.0.0.0/4`.
    pub fn is_experimental(&self) -> bool {
        self.0[0] & 0xf0 == 0xf0
    }

    /// Query whether the address falls into the "loopback" range.
    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }

    /// The prefix length of the network class the address falls into.
    ///
    /// Classes predate CIDR but hosts still accept broadcasts to the classful network.
    pub fn class_prefix(&self) -> u8 {
        match self.0[0] {
            0..=127 => 8,
            128..=191 => 16,
            _ => 24,
        }
    }

    /// Mask the address to some prefix length.
    ///
    /// Preserves only address bits that are relevant for the prefix length. This can be used to
    /// isolate the bits of the cidr subnet that the address belongs to.
    ///
    /// ```rust
    /// # use inetcore::wire::Ipv4Address as Address;
    /// let base = Address([192, 168, 178, 32]);
    /// let masked = base.mask(24);
    /// assert!(masked == Address([192, 168, 178, 0]));
    /// ```
    ///
    /// # Panics
    /// This function panics if `prefix` is greater than 32.
    pub fn mask(&self, prefix: u8) -> Address {
        assert!(prefix <= 32);
        let masked_off = (!0u32)
            .checked_shr(prefix.into())
            .unwrap_or(0);
        let as_int = self.to_network_integer() & !masked_off;
        Address::from_network_integer(as_int)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// An IPv4 CIDR host: an address and a variable-length subnet masking prefix length.
///
/// Relevant RFCs:
/// * [RFC 1519: Classless Inter-Domain Routing (CIDR)][RFC1519]
/// * [RFC 3021: Using 31-Bit Prefixes on IPv4 Point-to-Point Links][RFC3021]
///
/// [RFC1519]: https://tools.ietf.org/html/rfc1519
/// [RFC3021]: https://tools.ietf.org/html/rfc3021
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Cidr {
    address:    Address,
    prefix_len: u8,
}

/// An IPv4 CIDR block.
///
/// Relevant RFCs:
/// * [RFC 1519: Classless Inter-Domain Routing (CIDR)][RFC1519]
///
/// [RFC1519]: https://tools.ietf.org/html/rfc1519
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Subnet {
    address: Address,
    prefix: u8,
}

impl Cidr {
    /// Create an IPv4 CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 32.
    pub fn new(address: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 32);
        Cidr { address, prefix_len }
    }

    /// Return the address of this IPv4 CIDR block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv4 CIDR block.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Return the network mask of this IPv4 CIDR.
    pub fn netmask(&self) -> Address {
        Address::from_network_integer(!0).mask(self.prefix_len)
    }

    /// Determines if the subnet contains a reserved network and broadcast address.
    ///
    /// This is the case if the prefix is shorter than 31 bits according to
    /// [RFC3021](https://tools.ietf.org/html/rfc3021).
    pub fn has_network_and_broadcast(&self) -> bool {
        self.prefix_len < 31
    }

    /// Return the directed broadcast address of this IPv4 CIDR.
    pub fn broadcast(&self) -> Option<Address> {
        if !self.has_network_and_broadcast() {
            return None;
        }

        let netaddr = self.address.to_network_integer();
        let netmask = self.netmask().to_network_integer();
        Some(Address::from_network_integer(netaddr | !netmask))
    }

    /// Return the network address of this IPv4 CIDR.
    ///
    /// This is the all-zero host form of the subnet which older hosts use as broadcast.
    pub fn network(&self) -> Option<Address> {
        if !self.has_network_and_broadcast() {
            return None;
        }

        Some(self.address.mask(self.prefix_len))
    }

    /// The subnet containing this address.
    pub fn subnet(self) -> Subnet {
        Subnet::from_cidr(self)
    }
}

impl Subnet {
    /// The subnet that contains all addresses.
    pub const ANY: Self = Subnet { address: Address::UNSPECIFIED, prefix: 0 };

    /// Create the block of a prefix, masking off host bits of `address`.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 32.
    pub fn new(address: Address, prefix: u8) -> Self {
        Subnet {
            address: address.mask(prefix),
            prefix,
        }
    }

    /// A block containing exactly one host.
    pub fn host(address: Address) -> Self {
        Subnet { address, prefix: 32 }
    }

    /// Get the subnet block of a CIDR address.
    pub fn from_cidr(cidr: Cidr) -> Self {
        Subnet::new(cidr.address(), cidr.prefix_len())
    }

    /// The network address, that is the lowest address of the block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv4 CIDR block.
    pub fn prefix_len(&self) -> u8 {
        self.prefix
    }

    /// Query whether a host is contained in the block describe by `self`.
    ///
    /// It completely ignores the host identifiers. Consequently this will also successfully work
    /// for blocks that do not have an address identifying the network itself, that is for prefix
    /// lengths 31 and 32.
    pub fn contains(&self, address: Address) -> bool {
        // Own address is already masked.
        self.address == address.mask(self.prefix)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// The "don't fragment" bit of the flags and offset word.
const FLAG_DF: u16 = 0x4000;
/// The "more fragments" bit of the flags and offset word.
const FLAG_MF: u16 = 0x2000;
/// The offset part of the flags and offset word, in units of eight octets.
const OFFSET_MASK: u16 = 0x1fff;

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length is greater
    /// than total length.
    ///
    /// The result of this check is invalidated by calling [set_header_len]
    /// and [set_total_len].
    ///
    /// [set_header_len]: #method.set_header_len
    /// [set_total_len]: #method.set_total_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::DST_ADDR.end {
            Err(Error::Truncated)
        } else if len < self.header_len() as usize {
            Err(Error::Truncated)
        } else if (self.header_len() as u16) < HEADER_LEN as u16 {
            Err(Error::Malformed)
        } else if self.header_len() as u16 > self.total_len() {
            Err(Error::Malformed)
        } else if len < self.total_len() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    /// Return the "don't fragment" flag.
    #[inline]
    pub fn dont_frag(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & FLAG_DF != 0
    }

    /// Return the "more fragments" flag.
    #[inline]
    pub fn more_frags(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & FLAG_MF != 0
    }

    /// Return the fragment offset, in octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        (NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & OFFSET_MASK) << 3
    }

    /// Query whether this datagram is a fragment of a larger one.
    pub fn is_fragment(&self) -> bool {
        self.more_frags() || self.frag_offset() != 0
    }

    /// Return the time to live field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// The option bytes following the fixed header.
    pub fn options(&self) -> &[u8] {
        &self.0[HEADER_LEN..usize::from(self.header_len())]
    }

    /// The option bytes following the fixed header, mutably.
    pub fn options_mut(&mut self) -> &mut [u8] {
        let end = usize::from(self.header_len());
        &mut self.0[HEADER_LEN..end]
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0[..self.header_len() as usize]) == !0
    }

    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0x0f) | ((value / 4) & 0x0f);
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Set the "don't fragment" flag.
    #[inline]
    pub fn set_dont_frag(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | FLAG_DF } else { raw & !FLAG_DF };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the "more fragments" flag.
    #[inline]
    pub fn set_more_frags(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | FLAG_MF } else { raw & !FLAG_MF };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the fragment offset, in octets.
    ///
    /// The offset is truncated to a multiple of eight.
    #[inline]
    pub fn set_frag_offset(&mut self, value: u16) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = (raw & !OFFSET_MASK) | (value >> 3);
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = {
            !checksum::data(&self.0[..self.header_len() as usize])
        };
        self.set_checksum(checksum)
    }

}

/// IPv4 header options (RFC 791 section 3.1).
pub mod option {
    /// End of option list.
    pub const EOL: u8 = 0;
    /// No operation, used for alignment.
    pub const NOP: u8 = 1;
    /// Record route.
    pub const RR: u8 = 7;
    /// Internet timestamp.
    pub const TS: u8 = 68;
    /// Loose source and record route.
    pub const LSRR: u8 = 131;
    /// Strict source and record route.
    pub const SSRR: u8 = 137;

    /// Offset of the kind octet within an option.
    pub const OPTVAL: usize = 0;
    /// Offset of the length octet.
    pub const OLEN: usize = 1;
    /// Offset of the pointer octet of route and timestamp options.
    pub const OFFSET: usize = 2;
    /// Smallest valid pointer value, one-based.
    pub const MINOFF: usize = 4;

    /// Timestamps only.
    pub const TS_TSONLY: u8 = 0;
    /// Address and timestamp pairs.
    pub const TS_TSANDADDR: u8 = 1;
    /// Timestamps for prespecified addresses.
    pub const TS_PRESPEC: u8 = 3;

    /// Query whether an option of this kind is copied into every fragment.
    pub fn is_copied(kind: u8) -> bool {
        kind & 0x80 != 0
    }

    /// Build the options for all fragments but the first.
    ///
    /// Only options with the copied bit set are kept, alignment `NOP`s are preserved, and the
    /// result is padded with `EOL` to a multiple of four octets. The input is assumed to have
    /// been validated by the receive path or built locally.
    pub fn copy_for_fragment(options: &[u8]) -> Vec<u8> {
        let mut copied = Vec::with_capacity(options.len());
        let mut rest = options;
        while let Some(&kind) = rest.first() {
            if kind == EOL {
                break;
            }
            if kind == NOP {
                copied.push(NOP);
                rest = &rest[1..];
                continue;
            }
            let len = match rest.get(OLEN) {
                Some(&len) if len >= 2 => usize::from(len).min(rest.len()),
                _ => break,
            };
            if is_copied(kind) {
                copied.extend_from_slice(&rest[..len]);
            }
            rest = &rest[len..];
        }
        while copied.len() % 4 != 0 {
            copied.push(EOL);
        }
        copied
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[rustfmt::skip]
    static PACKET_BYTES: [u8; 30] = [
        0x45, 0x00, 0x00, 0x1e,
        0x01, 0x02, 0x62, 0x03,
        0x1a, 0x01, 0xd5, 0x6e,
        0x11, 0x12, 0x13, 0x14,
        0x21, 0x22, 0x23, 0x24,
        0xaa, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x00, 0xff
    ];

    #[test]
    fn test_deconstruct() {
        let packet = ipv4::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 30);
        assert_eq!(packet.ident(), 0x102);
        assert_eq!(packet.more_frags(), true);
        assert_eq!(packet.dont_frag(), true);
        assert_eq!(packet.frag_offset(), 0x203 * 8);
        assert_eq!(packet.hop_limit(), 0x1a);
        assert_eq!(packet.protocol(), Protocol::Icmp);
        assert_eq!(packet.checksum(), 0xd56e);
        assert_eq!(packet.src_addr(), Address([0x11, 0x12, 0x13, 0x14]));
        assert_eq!(packet.dst_addr(), Address([0x21, 0x22, 0x23, 0x24]));
        assert_eq!(packet.verify_checksum(), true);
        assert!(packet.options().is_empty());
    }

    #[test]
    fn test_construct() {
        let mut bytes = vec![0; 30];
        {
            let packet = ipv4::new_unchecked_mut(&mut bytes);
            packet.set_version(4);
            packet.set_header_len(20);
            packet.set_total_len(30);
            packet.set_ident(0x102);
            packet.set_more_frags(true);
            packet.set_dont_frag(true);
            packet.set_frag_offset(0x203 * 8);
            packet.set_hop_limit(0x1a);
            packet.set_protocol(Protocol::Icmp);
            packet.set_src_addr(Address([0x11, 0x12, 0x13, 0x14]));
            packet.set_dst_addr(Address([0x21, 0x22, 0x23, 0x24]));
            packet.fill_checksum();
        }
        bytes[20..].copy_from_slice(&PACKET_BYTES[20..]);
        assert_eq!(&bytes[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn test_check_len() {
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..19]), Err(Error::Truncated));
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..29]), Err(Error::Truncated));
        let mut bytes = PACKET_BYTES;
        // Header longer than the datagram.
        bytes[3] = 0x10;
        assert_eq!(ipv4::new_checked(&bytes[..]), Err(Error::Malformed));
    }

    #[test]
    fn test_cidr() {
        let cidr = Cidr::new(Address::new(192, 168, 1, 10), 24);
        assert_eq!(cidr.netmask(), Address::new(255, 255, 255, 0));
        assert_eq!(cidr.broadcast(), Some(Address::new(192, 168, 1, 255)));
        assert_eq!(cidr.network(), Some(Address::new(192, 168, 1, 0)));
        assert!(cidr.subnet().contains(Address::new(192, 168, 1, 200)));
        assert!(!cidr.subnet().contains(Address::new(192, 168, 2, 1)));
        assert_eq!(Cidr::new(Address::new(10, 0, 0, 1), 31).broadcast(), None);
    }

    #[test]
    fn test_address_classes() {
        assert!(Address::new(224, 0, 0, 5).is_multicast());
        assert!(Address::new(240, 0, 0, 1).is_experimental());
        assert!(Address::new(127, 0, 0, 1).is_loopback());
        assert!(Address::new(0, 1, 2, 3).is_net_zero());
        assert!(!Address::new(0, 1, 2, 3).is_unspecified());
        assert!(Address::new(10, 0, 0, 1).is_unicast());
        assert_eq!(Address::new(10, 0, 0, 1).class_prefix(), 8);
        assert_eq!(Address::new(172, 16, 0, 1).class_prefix(), 16);
        assert_eq!(Address::new(192, 168, 1, 1).class_prefix(), 24);
    }

    #[test]
    fn test_fragment_options() {
        #[rustfmt::skip]
        let options = [
            option::NOP,
            option::RR, 7, 4, 0, 0, 0, 0,
            option::LSRR, 7, 4, 10, 0, 0, 1,
            option::EOL,
        ];
        let copied = option::copy_for_fragment(&options);
        assert_eq!(copied, vec![option::NOP, option::LSRR, 7, 4, 10, 0, 0, 1]);
        assert_eq!(option::copy_for_fragment(&[option::RR, 3, 4, 0]), Vec::<u8>::new());
    }
}
