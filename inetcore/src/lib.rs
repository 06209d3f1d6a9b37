//! An IPv4 datagram engine for hosts and routers.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//!    1. [Overview of packet representations](wire/index.html#an-overview-over-packet-representations)
//! 3. [The layers](layer/index.html)
//!    1. [Receiving](layer/index.html#receiving)
//!    1. [Sending](layer/index.html#sending)
//!    1. [Address resolution](layer/arp/index.html)
//!    1. [The ip layer](layer/ip/index.html)
//! 4. [The stack](stack/index.html)
//!    1. [Configuration](config/index.html)
//!    1. [Statistics](stats/index.html)
//!    1. [Feeding from driver threads](netisr/index.html)
//! 5. [Network interfaces](nic/index.html)
//! 6. Internals
//!    1. [The storage module](storage/index.html)
//!    2. [Time](time/index.html)
//!
//! ## Design and relevant core concepts
//!
//! The library implements the datagram core of an IPv4 host: the address resolution cache for
//! Ethernet, the input path with validation and reassembly, and the output path with routing,
//! fragmentation and multicast. Transport protocols, ICMP and multicast routing are attached from
//! the outside, through protocol handlers and the [`Hooks`] of a stack.
//!
//! All state lives in one [`Stack`] value driven by a single task. It never reads a clock or
//! spawns threads on its own: the caller passes the current time into every entry point and polls
//! the timers. Drivers on other threads hand their frames over through the bounded queues of the
//! [`netisr`] module.
//!
//! Packet data is owned by exactly one [`Buffer`] at any time and moves from stage to stage of the
//! pipelines. A stage keeping a datagram, a reassembly queue or a pending resolution, owns it until
//! it hands it on or drops it.
//!
//! [`Hooks`]: layer/trait.Hooks.html
//! [`Stack`]: stack/struct.Stack.html
//! [`netisr`]: netisr/index.html
//! [`Buffer`]: storage/struct.Buffer.html
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod config;
pub mod layer;
pub mod netisr;
pub mod nic;
pub mod stack;
pub mod stats;
pub mod storage;
pub mod time;
pub mod wire;

#[cfg(test)]
mod testing;
