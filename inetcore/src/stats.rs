//! Counters of the IP and ARP layers.
//!
//! The stack is driven by a single task so the counters are plain integers. Every dropped inbound
//! datagram or frame is additionally recorded by its [`DropReason`].
//!
//! [`DropReason`]: enum.DropReason.html
use core::fmt;
use std::collections::BTreeMap;

/// IP layer statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IpStats {
    /// Datagrams received.
    pub total: u64,
    /// Shorter than a minimal header.
    pub too_small: u64,
    /// Not version 4.
    pub bad_version: u64,
    /// Header length below the minimum or beyond the data.
    pub bad_header_len: u64,
    /// Header checksum mismatch.
    pub bad_checksum: u64,
    /// Total length smaller than the header.
    pub bad_len: u64,
    /// Less data than the total length claims.
    pub too_short: u64,
    /// Malformed options.
    pub bad_options: u64,
    /// Not for us and not forwardable.
    pub cant_forward: u64,
    /// Fragments received.
    pub fragments: u64,
    /// Fragments dropped, as duplicates or for lack of resources.
    pub frag_dropped: u64,
    /// Fragments dropped when their queue timed out.
    pub frag_timeout: u64,
    /// Datagrams completed from fragments.
    pub reassembled: u64,
    /// Reassembled datagrams larger than the maximum.
    pub too_long: u64,
    /// Fragments with an invalid length.
    pub bad_fragments: u64,
    /// Datagrams handed to a protocol.
    pub delivered: u64,
    /// Datagrams for an unregistered protocol.
    pub no_proto: u64,
    /// Datagrams forwarded.
    pub forward: u64,
    /// Redirects sent while forwarding.
    pub redirect_sent: u64,
    /// Datagrams originated locally.
    pub local_out: u64,
    /// Output without a route.
    pub no_route: u64,
    /// Datagrams fragmented on output.
    pub fragmented: u64,
    /// Fragments created on output.
    pub out_fragments: u64,
    /// Datagrams that needed but did not allow fragmentation.
    pub cant_frag: u64,
    /// Frames the device refused to transmit.
    pub out_dropped: u64,
    /// Datagrams dropped because the input queue was full.
    pub queue_dropped: u64,
}

/// Address resolution statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArpStats {
    /// Frames received.
    pub received: u64,
    /// Requests sent.
    pub requests_sent: u64,
    /// Replies sent.
    pub replies_sent: u64,
    /// Held datagrams dropped before resolution, replaced by a newer one or with their record.
    pub held_dropped: u64,
    /// Records expired by the aging timer.
    pub expired: u64,
    /// Records evicted because the table was full.
    pub evicted: u64,
    /// Destinations given up on after the retry ceiling.
    pub rejected: u64,
}

/// Why an inbound datagram or frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// Shorter than a minimal IPv4 header.
    TooSmall,
    /// Not an IPv4 datagram.
    BadVersion,
    /// Invalid header length.
    BadHeaderLen,
    /// Header checksum mismatch.
    BadChecksum,
    /// Total length smaller than the header length.
    BadLen,
    /// Less data than the total length.
    TooShort,
    /// Malformed option.
    BadOptions,
    /// Consumed by the filter hook.
    Filtered,
    /// The multicast router refused it, or forwarding is not possible.
    CantForward,
    /// Not addressed to us and forwarding is disabled.
    NotForUs,
    /// The receiving interface is gone.
    NoInterface,
    /// Duplicate or unqueueable fragment.
    FragmentDropped,
    /// Fragment with an invalid length.
    BadFragment,
    /// Reassembled datagram would exceed the maximum size.
    TooLong,
    /// Reassembly did not complete in time.
    FragmentTimeout,
    /// No handler for the protocol.
    NoProtocol,
    /// The input queue was full.
    QueueFull,
    /// ARP frame could not be parsed.
    ArpMalformed,
    /// ARP frame was sent by ourselves.
    ArpOwnFrame,
    /// ARP frame has a broadcast sender hardware address.
    ArpBroadcastSender,
    /// ARP frame for another host without a cached mapping.
    ArpNotForUs,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DropReason::TooSmall => "datagram too small",
            DropReason::BadVersion => "bad version",
            DropReason::BadHeaderLen => "bad header length",
            DropReason::BadChecksum => "bad header checksum",
            DropReason::BadLen => "total length below header length",
            DropReason::TooShort => "datagram shorter than total length",
            DropReason::BadOptions => "bad options",
            DropReason::Filtered => "filtered",
            DropReason::CantForward => "can not forward",
            DropReason::NotForUs => "not for us",
            DropReason::NoInterface => "no such interface",
            DropReason::FragmentDropped => "fragment dropped",
            DropReason::BadFragment => "bad fragment",
            DropReason::TooLong => "reassembled datagram too long",
            DropReason::FragmentTimeout => "reassembly timeout",
            DropReason::NoProtocol => "no protocol handler",
            DropReason::QueueFull => "input queue full",
            DropReason::ArpMalformed => "malformed arp frame",
            DropReason::ArpOwnFrame => "own arp frame",
            DropReason::ArpBroadcastSender => "arp from broadcast address",
            DropReason::ArpNotForUs => "arp for another host",
        })
    }
}

/// A histogram of drop reasons.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drops {
    counts: BTreeMap<DropReason, u64>,
}

impl Drops {
    /// Count one drop.
    pub fn record(&mut self, reason: DropReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    /// Count several drops at once.
    pub fn record_many(&mut self, reason: DropReason, count: u64) {
        if count > 0 {
            *self.counts.entry(reason).or_insert(0) += count;
        }
    }

    /// The number of drops for one reason.
    pub fn get(&self, reason: DropReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    /// The number of drops for all reasons.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate over the reasons with at least one drop.
    pub fn iter(&self) -> impl Iterator<Item=(DropReason, u64)> + '_ {
        self.counts.iter().map(|(&reason, &count)| (reason, count))
    }
}

/// All counters of a stack.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub ip: IpStats,
    pub arp: ArpStats,
    pub drops: Drops,
}
