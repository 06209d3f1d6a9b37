//! Queues from receive contexts to the task running the stack.
//!
//! Drivers receive on their own threads but the [`Stack`] is owned by a single task. A driver
//! gets a [`Handle`] and only enqueues: IP datagrams and ARP frames each have a bounded queue,
//! sized by `ip_queue_len` and `arp_queue_len` of the [`Config`]. A full queue drops the new item.
//! The task waits on the [`Netisr`] and drains the queues into the stack, recording the drops of
//! the queues since the last run.
//!
//! [`Stack`]: ../stack/struct.Stack.html
//! [`Handle`]: struct.Handle.html
//! [`Netisr`]: struct.Netisr.html
//! [`Config`]: ../config/struct.Config.html
use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use crossbeam::crossbeam_channel::{self, Receiver, Sender, TrySendError};

use crate::config::Config;
use crate::layer::Hooks;
use crate::nic::IfIndex;
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::Buffer;
use crate::time::{Duration, Instant};

type Item = (Buffer, IfIndex);

/// The enqueueing side, one per receive context.
#[derive(Clone)]
pub struct Handle {
    ip: Sender<Item>,
    arp: Sender<Item>,
    wake: Sender<()>,
    dropped: Arc<Dropped>,
}

/// The draining side, owned by the task running the stack.
pub struct Netisr {
    ip: Receiver<Item>,
    arp: Receiver<Item>,
    wake: Receiver<()>,
    dropped: Arc<Dropped>,
}

#[derive(Default)]
struct Dropped {
    ip: AtomicCell<u64>,
    arp: AtomicCell<u64>,
}

/// Create the queues with the capacities of `config`.
pub fn queues(config: &Config) -> (Handle, Netisr) {
    let (ip_tx, ip_rx) = crossbeam_channel::bounded(config.ip_queue_len);
    let (arp_tx, arp_rx) = crossbeam_channel::bounded(config.arp_queue_len);
    // One pending wakeup is enough, the task drains everything it finds.
    let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
    let dropped = Arc::new(Dropped::default());

    let handle = Handle {
        ip: ip_tx,
        arp: arp_tx,
        wake: wake_tx,
        dropped: dropped.clone(),
    };
    let netisr = Netisr {
        ip: ip_rx,
        arp: arp_rx,
        wake: wake_rx,
        dropped,
    };
    (handle, netisr)
}

impl Handle {
    /// Queue a received IP datagram.
    ///
    /// Returns `false` if the datagram was dropped.
    pub fn ip_enqueue(&self, datagram: Buffer, interface: IfIndex) -> bool {
        self.enqueue(&self.ip, &self.dropped.ip, (datagram, interface))
    }

    /// Queue a received ARP frame, without its link header.
    ///
    /// Returns `false` if the frame was dropped.
    pub fn arp_enqueue(&self, frame: Buffer, interface: IfIndex) -> bool {
        self.enqueue(&self.arp, &self.dropped.arp, (frame, interface))
    }

    fn enqueue(&self, queue: &Sender<Item>, dropped: &AtomicCell<u64>, item: Item) -> bool {
        match queue.try_send(item) {
            Ok(()) => {
                // Already signalled if full.
                let _ = self.wake.try_send(());
                true
            },
            Err(TrySendError::Full(_)) => {
                dropped.fetch_add(1);
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Netisr {
    /// Block until something was queued or `timeout` passed.
    ///
    /// Returns `true` when woken by an enqueue.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wake.recv_timeout(timeout).is_ok()
    }

    /// Feed the queued frames and datagrams to the stack.
    ///
    /// ARP frames go first so that a reply and the datagrams it unblocks arrive in order.
    /// Processes what was queued when called, and then the datagrams looped back meanwhile.
    /// Returns the number of items processed.
    pub fn run<H: Hooks>(&self, stack: &mut Stack<H>, now: Instant) -> usize {
        let ip_dropped = self.dropped.ip.swap(0);
        let arp_dropped = self.dropped.arp.swap(0);
        if ip_dropped + arp_dropped > 0 {
            net_trace!("netisr: {} datagrams and {} frames dropped at full queues", ip_dropped, arp_dropped);
        }
        stack.stats.ip.queue_dropped += ip_dropped;
        stack.stats.drops.record_many(DropReason::QueueFull, ip_dropped + arp_dropped);

        let mut processed = 0;
        for _ in 0..self.arp.len() {
            match self.arp.try_recv() {
                Ok((frame, interface)) => stack.arp_input(frame, interface, now),
                Err(_) => break,
            }
            processed += 1;
        }
        for _ in 0..self.ip.len() {
            match self.ip.try_recv() {
                Ok((datagram, interface)) => stack.ip_input(datagram, interface, now),
                Err(_) => break,
            }
            processed += 1;
        }
        processed + stack.process_loopback(now)
    }

    /// Items waiting in both queues.
    pub fn len(&self) -> usize {
        self.ip.len() + self.arp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;
    use crate::testing::*;
    use crate::wire::{ArpOperation, EthernetAddress};

    #[test]
    fn drains_into_stack() {
        let (mut stack, idx, tap) = host();
        let sink = Sink::default();
        stack.register(PROTO, sink.clone());
        let (handle, netisr) = queues(stack.config());

        assert!(handle.ip_enqueue(Buffer::new(datagram(PEER, HOST, b"queued")), idx));
        assert!(handle.arp_enqueue(
            arp(ArpOperation::Request, PEER_HW, PEER, EthernetAddress::UNSPECIFIED, HOST),
            idx));
        assert_eq!(netisr.len(), 2);
        assert!(netisr.wait(Duration::from_millis(0)));

        assert_eq!(netisr.run(&mut stack, Instant::from_millis(0)), 2);
        assert!(netisr.is_empty());
        let received = sink.take();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload(), b"queued".to_vec());
        // The reply to the request.
        assert_eq!(tap.len(), 1);
        assert!(!netisr.wait(Duration::from_millis(0)));
    }

    #[test]
    fn full_queue_drops() {
        let mut config = Config::default();
        config.ip_queue_len = 2;
        let (mut stack, idx, _) = host_with(config);
        let sink = Sink::default();
        stack.register(PROTO, sink.clone());
        let (handle, netisr) = queues(stack.config());

        assert!(handle.ip_enqueue(Buffer::new(datagram(PEER, HOST, b"1")), idx));
        assert!(handle.ip_enqueue(Buffer::new(datagram(PEER, HOST, b"2")), idx));
        assert!(!handle.ip_enqueue(Buffer::new(datagram(PEER, HOST, b"3")), idx));

        netisr.run(&mut stack, Instant::from_millis(0));
        let payloads: Vec<_> = sink.take().iter().map(|packet| packet.payload()).collect();
        assert_eq!(payloads, vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(stack.stats().ip.queue_dropped, 1);
        assert_eq!(stack.stats().drops.get(DropReason::QueueFull), 1);

        // Counted once.
        netisr.run(&mut stack, Instant::from_millis(0));
        assert_eq!(stack.stats().drops.get(DropReason::QueueFull), 1);
    }

    #[test]
    fn enqueue_from_driver_thread() {
        let (mut stack, idx, _) = host();
        let sink = Sink::default();
        stack.register(PROTO, sink.clone());
        let (handle, netisr) = queues(stack.config());

        let driver = thread::spawn(move || {
            for _ in 0..10 {
                assert!(handle.ip_enqueue(Buffer::new(datagram(PEER, HOST, b"rx")), idx));
            }
        });
        driver.join().unwrap();

        assert!(netisr.wait(Duration::from_secs(1)));
        assert_eq!(netisr.run(&mut stack, Instant::from_millis(0)), 10);
        assert_eq!(sink.take().len(), 10);
    }
}
