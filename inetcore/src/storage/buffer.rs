use core::fmt;

use bitflags::bitflags;

use crate::nic::IfIndex;

bitflags! {
    /// How a buffer arrived or must be treated on the way out.
    #[derive(Default)]
    pub struct Flags: u8 {
        /// Received as a link-layer broadcast.
        const BCAST     = 0x01;
        /// Received as a link-layer multicast.
        const MCAST     = 0x02;
        /// Being forwarded on behalf of another host.
        const FORWARDED = 0x04;
    }
}

/// Metadata kept with the head of a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    /// The interface the data was received on, if any.
    pub interface: Option<IfIndex>,
    /// Delivery flags.
    pub flags: Flags,
}

/// A network buffer: octets stored in a chain of owned segments.
///
/// The chain is an implementation detail for cheap concatenation (reassembly, prepending headers
/// to fragments). Code that needs a contiguous view of a prefix calls `pullup` first, everything
/// else goes through the ranged copy operations.
#[derive(PartialEq, Eq)]
pub struct Buffer {
    segments: Vec<Vec<u8>>,
    meta: Meta,
}

impl Buffer {
    /// A buffer holding exactly `data` in one segment.
    pub fn new(data: Vec<u8>) -> Self {
        Buffer {
            segments: vec![data],
            meta: Meta::default(),
        }
    }

    /// A buffer made from a chain of segments, kept in order.
    pub fn from_segments(segments: Vec<Vec<u8>>) -> Self {
        let mut buffer = Buffer {
            segments,
            meta: Meta::default(),
        };
        buffer.compact();
        buffer
    }

    /// Replace the metadata.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// The metadata of the head of the chain.
    pub fn meta(&self) -> Meta {
        self.meta
    }

    /// Mutable access to the metadata.
    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// The total number of octets in all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of segments in the chain.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The first segment.
    ///
    /// Call `pullup` to guarantee that a prefix of interest is contained in it.
    pub fn head(&self) -> &[u8] {
        self.segments.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first segment, mutably.
    pub fn head_mut(&mut self) -> &mut [u8] {
        match self.segments.first_mut() {
            Some(seg) => seg.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Make the first `len` octets contiguous in the head segment.
    ///
    /// Returns `false`, leaving the buffer unchanged, if the buffer is shorter than `len`.
    pub fn pullup(&mut self, len: usize) -> bool {
        if self.head().len() >= len {
            return true;
        }
        if self.len() < len {
            return false;
        }

        let mut head = Vec::with_capacity(len);
        let mut consumed = 0;
        for seg in self.segments.iter_mut() {
            let missing = len - head.len();
            if missing == 0 {
                break;
            }
            if seg.len() <= missing {
                head.append(seg);
                consumed += 1;
            } else {
                head.extend(seg.drain(..missing));
            }
        }
        self.segments.drain(..consumed);
        self.segments.insert(0, head);
        true
    }

    /// Remove `len` octets from the front.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `len`.
    pub fn trim_front(&mut self, mut len: usize) {
        assert!(len <= self.len(), "trim beyond buffer end");
        for seg in self.segments.iter_mut() {
            if len == 0 {
                break;
            }
            let cut = len.min(seg.len());
            seg.drain(..cut);
            len -= cut;
        }
        self.compact();
    }

    /// Remove `len` octets from the back.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than `len`.
    pub fn trim_back(&mut self, len: usize) {
        let total = self.len();
        assert!(len <= total, "trim beyond buffer start");
        self.truncate(total - len);
    }

    /// Shorten the buffer to `len` octets, if it is longer.
    pub fn truncate(&mut self, len: usize) {
        let mut remaining = len;
        for seg in self.segments.iter_mut() {
            let keep = remaining.min(seg.len());
            seg.truncate(keep);
            remaining -= keep;
        }
        self.compact();
    }

    /// Append the data of another buffer, consuming it.
    ///
    /// The metadata of `self` is kept.
    pub fn append(&mut self, mut other: Buffer) {
        self.segments.append(&mut other.segments);
        self.compact();
    }

    /// Insert octets in front of the data, in a new head segment.
    pub fn prepend(&mut self, data: Vec<u8>) {
        self.segments.insert(0, data);
        self.compact();
    }

    /// Copy `len` octets starting at `offset` into `out`.
    ///
    /// # Panics
    /// This function panics if the range is not contained in the buffer.
    pub fn copy_to_slice(&self, mut offset: usize, out: &mut [u8]) {
        let mut written = 0;
        for seg in &self.segments {
            if written == out.len() {
                break;
            }
            if offset >= seg.len() {
                offset -= seg.len();
                continue;
            }
            let take = (seg.len() - offset).min(out.len() - written);
            out[written..written + take].copy_from_slice(&seg[offset..offset + take]);
            written += take;
            offset = 0;
        }
        assert_eq!(written, out.len(), "copy beyond buffer end");
    }

    /// Copy a range of octets into a new vector.
    pub fn copy_range(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.copy_to_slice(offset, &mut out);
        out
    }

    /// Copy a range into a new buffer with the same metadata.
    pub fn copy_segment(&self, offset: usize, len: usize) -> Buffer {
        Buffer::new(self.copy_range(offset, len))
            .with_meta(self.meta)
    }

    /// Create an independent copy of the whole buffer.
    ///
    /// This is the only way to obtain a second owner of the same data.
    pub fn duplicate(&self) -> Buffer {
        Buffer {
            segments: self.segments.clone(),
            meta: self.meta,
        }
    }

    /// Flatten the chain into one vector.
    pub fn into_vec(mut self) -> Vec<u8> {
        if self.segments.len() == 1 {
            return self.segments.pop().unwrap_or_default();
        }
        self.segments.concat()
    }

    /// Copy all data into one vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// Iterate over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item=&[u8]> {
        self.segments.iter().map(Vec::as_slice)
    }

    /// Drop empty segments, keeping at least one.
    fn compact(&mut self) {
        self.segments.retain(|seg| !seg.is_empty());
        if self.segments.is_empty() {
            self.segments.push(Vec::new());
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("segments", &self.segments.len())
            .field("meta", &self.meta)
            .finish()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Buffer::new(data)
    }
}

impl From<&'_ [u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        Buffer::new(data.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn chain() -> Buffer {
        Buffer::from_segments(vec![vec![0, 1, 2], vec![], vec![3, 4], vec![5, 6, 7, 8]])
    }

    #[test]
    fn pullup_merges_prefix() {
        let mut buffer = chain();
        assert_eq!(buffer.segment_count(), 3);
        assert!(buffer.pullup(4));
        assert_eq!(buffer.head(), &[0, 1, 2, 3]);
        assert!(buffer.pullup(6));
        assert_eq!(buffer.head(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(buffer.to_vec(), (0..9).collect::<Vec<u8>>());
        assert!(!buffer.pullup(10));
        assert_eq!(buffer.len(), 9);
    }

    #[test]
    fn trim_both_ends() {
        let mut buffer = chain();
        buffer.trim_front(4);
        assert_eq!(buffer.to_vec(), vec![4, 5, 6, 7, 8]);
        buffer.trim_back(3);
        assert_eq!(buffer.to_vec(), vec![4, 5]);
        buffer.trim_front(2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.head(), &[] as &[u8]);
    }

    #[test]
    fn copy_ranges_across_segments() {
        let buffer = chain();
        assert_eq!(buffer.copy_range(2, 4), vec![2, 3, 4, 5]);
        assert_eq!(buffer.copy_range(0, 0), Vec::<u8>::new());
        let part = buffer.copy_segment(5, 4);
        assert_eq!(part.into_vec(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn append_and_duplicate() {
        let mut buffer = Buffer::new(vec![1, 2]);
        buffer.meta_mut().flags = Flags::BCAST;
        let other = Buffer::new(vec![3]).with_meta(Meta { interface: None, flags: Flags::MCAST });
        buffer.append(other);
        buffer.prepend(vec![0]);
        assert_eq!(buffer.to_vec(), vec![0, 1, 2, 3]);
        assert_eq!(buffer.meta().flags, Flags::BCAST);

        let copy = buffer.duplicate();
        buffer.truncate(1);
        assert_eq!(copy.to_vec(), vec![0, 1, 2, 3]);
        assert_eq!(buffer.to_vec(), vec![0]);
    }

    #[test]
    #[should_panic]
    fn copy_out_of_range() {
        chain().copy_range(7, 3);
    }
}
