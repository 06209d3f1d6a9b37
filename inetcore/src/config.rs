//! Run-time configuration of the stack.
//!
//! The stack reads its [`Config`] at every use, changes through [`Stack::config_mut`] take effect
//! with the next datagram or timer tick.
//!
//! [`Config`]: struct.Config.html
//! [`Stack::config_mut`]: ../stack/struct.Stack.html#method.config_mut
use crate::time::Duration;
use crate::wire::Checksum;

/// The tunables of the IP and ARP layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether header checksums of received datagrams are verified.
    pub checksum_rx: Checksum,
    /// Whether header checksums of sent datagrams are computed.
    ///
    /// Set to `Ignored` when the device fills them in.
    pub checksum_tx: Checksum,
    /// Forward datagrams not addressed to this host.
    pub forwarding: bool,
    /// Send ICMP redirects when forwarding back out the receiving interface.
    pub send_redirects: bool,
    /// Allow fragmentation of datagrams sent to a broadcast address.
    pub fragment_broadcast: bool,
    /// Time to live of locally originated datagrams.
    pub default_ttl: u8,
    /// Time to live of locally originated multicast datagrams.
    pub default_multicast_ttl: u8,
    /// Lifetime of a reassembly queue, in slow timer ticks.
    pub frag_ttl: u8,
    /// Upper bound of address resolution records before the oldest is evicted.
    pub arp_max_entries: usize,
    /// Minimum interval between two requests for the same address.
    pub arp_retry_interval: Duration,
    /// Requests sent before a destination is considered down.
    pub arp_max_tries: u32,
    /// How long a destination that did not answer is rejected.
    pub arp_reject_cooldown: Duration,
    /// Lifetime of a resolved mapping.
    pub arp_keep: Duration,
    /// Period of the aging timer over the resolution records.
    pub arp_prune_interval: Duration,
    /// Capacity of the IP input queue.
    pub ip_queue_len: usize,
    /// Capacity of the ARP input queue.
    pub arp_queue_len: usize,
    /// Multicast memberships allowed per socket option record.
    pub max_memberships: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            checksum_rx: Checksum::Manual,
            checksum_tx: Checksum::Manual,
            forwarding: false,
            send_redirects: true,
            fragment_broadcast: false,
            default_ttl: 64,
            default_multicast_ttl: 1,
            frag_ttl: 60,
            arp_max_entries: 12,
            arp_retry_interval: Duration::from_secs(1),
            arp_max_tries: 5,
            arp_reject_cooldown: Duration::from_secs(20),
            arp_keep: Duration::from_secs(20 * 60),
            arp_prune_interval: Duration::from_secs(5 * 60),
            ip_queue_len: 50,
            arp_queue_len: 50,
            max_memberships: 20,
        }
    }
}
