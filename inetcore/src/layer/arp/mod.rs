//! Address resolution for IPv4 over Ethernet.
//!
//! Resolution state hangs off host routes. Looking up a destination on a network attached to a
//! broadcast interface clones a host route from the network route and attaches a [`Record`] to
//! it. The record holds the resolved hardware address, or the one datagram waiting for it while
//! requests are sent. A destination that does not answer `arp_max_tries` requests is rejected for
//! `arp_reject_cooldown`, sends to it fail fast.
//!
//! Resolved mappings live for `arp_keep` and are aged by the timer of the stack. Entries added
//! through [`Stack::arp_set`] may be permanent and may be published, that is answered for by this
//! host.
//!
//! [`Record`]: struct.Record.html
//! [`Stack::arp_set`]: ../../stack/struct.Stack.html#method.arp_set
mod cache;
mod resolve;
#[cfg(test)]
mod tests;

pub use cache::{Cache, Record};

pub use resolve::{
    Entry,
    Flags,
    Resolution,
};
