// Heads up! Before working on this file you should read, at least,
// the parts of RFC 1122 that discuss ARP.
use slab::Slab;

use crate::layer::ip::RouteId;
use crate::storage::Buffer;
use crate::wire::EthernetAddress;

/// The resolution state of one host route.
///
/// A record is resolved when it has a hardware address. An unresolved record holds at most one
/// datagram, the latest one that could not be sent.
#[derive(Debug)]
pub struct Record {
    route: RouteId,
    hardware_addr: Option<EthernetAddress>,
    hold: Option<Buffer>,
    asked: u32,
    published: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The arena of resolution records.
///
/// Records are chained from the least to the most recently validated one so that a full cache
/// can evict the oldest.
#[derive(Debug, Default)]
pub struct Cache {
    records: Slab<Record>,
    oldest: Option<usize>,
    newest: Option<usize>,
}

impl Record {
    /// The host route this record belongs to.
    pub fn route(&self) -> RouteId {
        self.route
    }

    /// The resolved hardware address.
    pub fn hardware_addr(&self) -> Option<EthernetAddress> {
        self.hardware_addr
    }

    /// Requests sent since the last answer.
    pub fn asked(&self) -> u32 {
        self.asked
    }

    /// Whether this host answers requests for the address.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Whether a datagram waits for the resolution.
    pub fn is_holding(&self) -> bool {
        self.hold.is_some()
    }

    pub(crate) fn set_hardware_addr(&mut self, addr: Option<EthernetAddress>) {
        self.hardware_addr = addr;
    }

    pub(crate) fn set_published(&mut self, published: bool) {
        self.published = published;
    }

    pub(crate) fn asked_mut(&mut self) -> &mut u32 {
        &mut self.asked
    }

    /// Hold a datagram, returning the one it replaces.
    pub(crate) fn hold(&mut self, buffer: Buffer) -> Option<Buffer> {
        self.hold.replace(buffer)
    }

    pub(crate) fn take_hold(&mut self) -> Option<Buffer> {
        self.hold.take()
    }
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    /// The number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: usize) -> Option<&Record> {
        self.records.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: usize) -> Option<&mut Record> {
        self.records.get_mut(key)
    }

    /// Create an unresolved record for a route, as the most recent one.
    pub(crate) fn insert(&mut self, route: RouteId) -> usize {
        let key = self.records.insert(Record {
            route,
            hardware_addr: None,
            hold: None,
            asked: 0,
            published: false,
            prev: None,
            next: None,
        });
        self.link_newest(key);
        key
    }

    /// Remove a record, returning it with any held datagram.
    pub(crate) fn remove(&mut self, key: usize) -> Option<Record> {
        if !self.records.contains(key) {
            return None;
        }
        self.unlink(key);
        Some(self.records.remove(key))
    }

    /// Mark a record as the most recently validated one.
    pub(crate) fn touch(&mut self, key: usize) {
        if self.records.contains(key) && self.newest != Some(key) {
            self.unlink(key);
            self.link_newest(key);
        }
    }

    /// The least recently validated record satisfying `pred`.
    pub fn oldest_where<F>(&self, mut pred: F) -> Option<usize>
        where F: FnMut(&Record) -> bool,
    {
        let mut cursor = self.oldest;
        while let Some(key) = cursor {
            let record = &self.records[key];
            if pred(record) {
                return Some(key);
            }
            cursor = record.next;
        }
        None
    }

    /// Keys of all records, from the oldest to the newest.
    pub fn keys(&self) -> Vec<usize> {
        let mut keys = Vec::with_capacity(self.records.len());
        let mut cursor = self.oldest;
        while let Some(key) = cursor {
            keys.push(key);
            cursor = self.records[key].next;
        }
        keys
    }

    fn link_newest(&mut self, key: usize) {
        let prev = self.newest;
        {
            let record = &mut self.records[key];
            record.prev = prev;
            record.next = None;
        }
        match prev {
            Some(prev) => self.records[prev].next = Some(key),
            None => self.oldest = Some(key),
        }
        self.newest = Some(key);
    }

    fn unlink(&mut self, key: usize) {
        let (prev, next) = {
            let record = &mut self.records[key];
            (record.prev.take(), record.next.take())
        };
        match prev {
            Some(prev) => self.records[prev].next = next,
            None => self.oldest = next,
        }
        match next {
            Some(next) => self.records[next].prev = prev,
            None => self.newest = prev,
        }
    }
}
