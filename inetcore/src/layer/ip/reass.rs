//! Reassembly of fragmented datagrams.
//!
//! Relevant rfc791, rfc815. Fragments are queued per (ident, source, destination, protocol) and
//! kept sorted by offset. Data overlapping a fragment already queued is trimmed from the newer
//! one, so that no octet is ever covered twice. A queue completes once its fragments cover the
//! datagram from offset zero without gaps and the last one does not announce more fragments.
use slab::Slab;

use crate::stats::DropReason;
use crate::storage::Buffer;
use crate::wire::{ipv4_packet, Ipv4Address, IPV4_MAX_PACKET_LEN};

/// The identity of a fragmented datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    ident: u16,
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    protocol: u8,
}

#[derive(Debug)]
struct Fragment {
    /// Offset of the data in the datagram, in octets.
    offset: usize,
    /// Length of the data.
    len: usize,
    more: bool,
    data: Buffer,
}

#[derive(Debug)]
struct Queue {
    key: Key,
    /// Remaining slow timer ticks.
    ttl: u8,
    /// The header of the fragment at offset zero.
    header: Option<Vec<u8>>,
    fragments: Vec<Fragment>,
}

/// The reassembly queues of a stack.
#[derive(Debug, Default)]
pub struct Reassembly {
    queues: Slab<Queue>,
}

impl Key {
    fn of(header: &ipv4_packet) -> Self {
        Key {
            ident: header.ident(),
            src_addr: header.src_addr(),
            dst_addr: header.dst_addr(),
            protocol: header.protocol().into(),
        }
    }
}

impl Queue {
    /// The length of the datagram, if all of it has arrived.
    fn complete_len(&self) -> Option<usize> {
        let mut next = 0;
        for fragment in &self.fragments {
            if fragment.offset != next {
                return None;
            }
            next += fragment.len;
        }
        match self.fragments.last() {
            Some(last) if !last.more => Some(next),
            _ => None,
        }
    }
}

impl Reassembly {
    pub fn new() -> Self {
        Reassembly::default()
    }

    /// The number of datagrams being reassembled.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// The number of fragments waiting in all queues.
    pub fn fragment_count(&self) -> usize {
        self.queues.iter().map(|(_, queue)| queue.fragments.len()).sum()
    }

    /// Queue a fragment.
    ///
    /// The header of `datagram`, `header_len` octets, must be contiguous at its head and its
    /// length must agree with the total length field. Returns the reassembled datagram and its
    /// header length when this fragment completed it.
    pub(crate) fn insert(&mut self, mut datagram: Buffer, header_len: usize, ttl: u8)
        -> Result<Option<(Buffer, usize)>, DropReason>
    {
        let (key, offset, more) = {
            let header = ipv4_packet::new_unchecked(&datagram.head()[..header_len]);
            (Key::of(header), usize::from(header.frag_offset()), header.more_frags())
        };
        let meta = datagram.meta();
        let header = datagram.copy_range(0, header_len);
        datagram.trim_front(header_len);

        let slot = match self.find(key) {
            Some(slot) => slot,
            None => self.queues.insert(Queue {
                key,
                ttl,
                header: None,
                fragments: Vec::new(),
            }),
        };
        let queue = &mut self.queues[slot];

        let mut fragment = Fragment {
            offset,
            len: datagram.len(),
            more,
            data: datagram,
        };

        // The first fragment beginning after this one.
        let idx = queue.fragments.iter()
            .position(|queued| queued.offset > fragment.offset)
            .unwrap_or(queue.fragments.len());

        // The preceding fragment may already provide some of our data.
        if let Some(prev) = idx.checked_sub(1).map(|prev| &queue.fragments[prev]) {
            let prev_end = prev.offset + prev.len;
            if prev_end > fragment.offset {
                let overlap = prev_end - fragment.offset;
                if overlap >= fragment.len {
                    return Err(DropReason::FragmentDropped);
                }
                fragment.data.trim_front(overlap);
                fragment.offset += overlap;
                fragment.len -= overlap;
            }
        }

        // Trim succeeding fragments we overlap, dequeue those we cover completely.
        while idx < queue.fragments.len() {
            let end = fragment.offset + fragment.len;
            let next = &mut queue.fragments[idx];
            if end <= next.offset {
                break;
            }
            let overlap = end - next.offset;
            if overlap < next.len {
                next.data.trim_front(overlap);
                next.offset += overlap;
                next.len -= overlap;
                break;
            }
            queue.fragments.remove(idx);
        }

        if offset == 0 && queue.header.is_none() {
            queue.header = Some(header);
        }
        queue.fragments.insert(idx, fragment);

        let payload_len = match queue.complete_len() {
            Some(len) => len,
            None => return Ok(None),
        };

        let queue = self.queues.remove(slot);
        let mut header = queue.header
            .expect("a queue covering offset zero has the first header");
        let header_len = header.len();
        if payload_len + header_len > IPV4_MAX_PACKET_LEN {
            net_debug!("reassembled datagram {:?} too long: {}", queue.key, payload_len + header_len);
            return Err(DropReason::TooLong);
        }

        {
            let packet = ipv4_packet::new_unchecked_mut(&mut header);
            packet.set_total_len((payload_len + header_len) as u16);
            packet.set_more_frags(false);
            packet.set_frag_offset(0);
            packet.fill_checksum();
        }
        let mut datagram = Buffer::new(header).with_meta(meta);
        for fragment in queue.fragments {
            datagram.append(fragment.data);
        }
        Ok(Some((datagram, header_len)))
    }

    /// Drop the queue of a datagram that arrived unfragmented.
    pub(crate) fn discard(&mut self, header: &ipv4_packet) -> bool {
        match self.find(Key::of(header)) {
            Some(slot) => {
                self.queues.remove(slot);
                true
            },
            None => false,
        }
    }

    /// Age all queues by one tick.
    ///
    /// Returns the number of queues that timed out and were dropped.
    pub(crate) fn slow_timeout(&mut self) -> u64 {
        let mut expired = Vec::new();
        for (slot, queue) in self.queues.iter_mut() {
            queue.ttl = queue.ttl.saturating_sub(1);
            if queue.ttl == 0 {
                expired.push(slot);
            }
        }
        for &slot in &expired {
            let queue = self.queues.remove(slot);
            net_trace!("reassembly of {:?} timed out with {} fragments", queue.key, queue.fragments.len());
        }
        expired.len() as u64
    }

    fn find(&self, key: Key) -> Option<usize> {
        self.queues.iter()
            .find(|(_, queue)| queue.key == key)
            .map(|(slot, _)| slot)
    }
}
