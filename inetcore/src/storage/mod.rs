//! Ownership of packet data.
//!
//! Every datagram travelling through the stack lives in exactly one [`Buffer`]. The buffer is
//! moved from stage to stage, a stage that keeps a datagram (the reassembly queue, a pending
//! resolution) owns it until it hands it on or drops it. Sharing happens only through an explicit
//! [`Buffer::duplicate`].
//!
//! [`Buffer`]: struct.Buffer.html
//! [`Buffer::duplicate`]: struct.Buffer.html#method.duplicate
mod buffer;

pub use self::buffer::{
    Buffer,
    Flags as BufferFlags,
    Meta as BufferMeta};
