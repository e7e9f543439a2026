//! Broadcast channel for one-to-many notifications.
//!
//! The sender never blocks: when the ring is full the oldest entry is
//! evicted and slow receivers skip ahead, counting what they missed.
//! Receivers poll; nothing here waits on I/O.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Creates a new broadcast channel with the given capacity.
///
/// # Arguments
/// * `capacity` - Maximum number of messages kept for slow receivers
///
/// # Returns
/// A sender that can create receivers.
#[must_use]
pub fn channel<T: Clone>(capacity: usize) -> BroadcastSender<T> {
    BroadcastSender::new(capacity)
}

struct Ring<T> {
    /// Buffered messages tagged with their sequence number.
    buffer: VecDeque<(u64, T)>,
    /// Sequence number of the next message.
    next_seq: u64,
    capacity: usize,
    closed: bool,
}

struct Shared<T> {
    ring: RwLock<Ring<T>>,
    senders: AtomicUsize,
}

/// Sender half of a broadcast channel. Cloning adds another producer.
pub struct BroadcastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> BroadcastSender<T> {
    /// Creates a new broadcast sender.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of messages to buffer (at least 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                ring: RwLock::new(Ring {
                    buffer: VecDeque::with_capacity(capacity),
                    next_seq: 0,
                    capacity,
                    closed: false,
                }),
                senders: AtomicUsize::new(1),
            }),
        }
    }

    /// Publishes a message to every receiver.
    ///
    /// # Returns
    /// The sequence number assigned to the message.
    pub fn send(&self, item: T) -> u64 {
        let mut ring = self.shared.ring.write();
        let seq = ring.next_seq;
        ring.next_seq += 1;

        while ring.buffer.len() >= ring.capacity {
            ring.buffer.pop_front();
        }
        ring.buffer.push_back((seq, item));
        seq
    }

    /// Creates a receiver that sees messages published from now on.
    #[must_use]
    pub fn subscribe(&self) -> BroadcastReceiver<T> {
        let next_seq = self.shared.ring.read().next_seq;
        BroadcastReceiver {
            shared: Arc::clone(&self.shared),
            next_seq,
            missed: 0,
        }
    }

    /// Returns the number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ring.read().buffer.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for BroadcastSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastSender")
            .field("senders", &self.shared.senders.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> Clone for BroadcastSender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for BroadcastSender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.ring.write().closed = true;
        }
    }
}

/// Receiver half of a broadcast channel.
pub struct BroadcastReceiver<T> {
    shared: Arc<Shared<T>>,
    next_seq: u64,
    missed: u64,
}

impl<T: Clone> BroadcastReceiver<T> {
    /// Receives the next message, skipping anything already evicted.
    ///
    /// # Returns
    /// `Some(item)` if a new message is available, `None` otherwise.
    pub fn recv(&mut self) -> Option<T> {
        let ring = self.shared.ring.read();
        let (oldest, _) = ring.buffer.front()?;

        if self.next_seq < *oldest {
            self.missed += oldest - self.next_seq;
            self.next_seq = *oldest;
        }

        let index = usize::try_from(self.next_seq - oldest).ok()?;
        let (_, item) = ring.buffer.get(index)?;
        self.next_seq += 1;
        Some(item.clone())
    }

    /// Receives every available message in publish order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = self.recv() {
            out.push(item);
        }
        out
    }

    /// Returns true while at least one sender is alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.shared.ring.read().closed
    }

    /// Number of published messages not yet received.
    #[must_use]
    pub fn lag(&self) -> u64 {
        self.shared.ring.read().next_seq.saturating_sub(self.next_seq)
    }

    /// Number of messages evicted before this receiver could read them.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

impl<T> std::fmt::Debug for BroadcastReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastReceiver")
            .field("next_seq", &self.next_seq)
            .field("missed", &self.missed)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for BroadcastReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            next_seq: self.next_seq,
            missed: self.missed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_broadcast() {
        let tx = channel::<u64>(16);
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        tx.send(42);

        assert_eq!(rx1.recv(), Some(42));
        assert_eq!(rx2.recv(), Some(42));
        assert_eq!(rx1.recv(), None);
    }

    #[test]
    fn test_late_subscriber() {
        let tx = channel::<u64>(16);
        tx.send(1);
        tx.send(2);

        let mut rx = tx.subscribe();
        tx.send(3);

        assert_eq!(rx.drain(), vec![3]);
    }

    #[test]
    fn test_slow_receiver_skips_evicted() {
        let tx = channel::<u64>(3);
        let mut rx = tx.subscribe();

        for i in 1..=5 {
            tx.send(i);
        }

        assert_eq!(rx.drain(), vec![3, 4, 5]);
        assert_eq!(rx.missed(), 2);
    }

    #[test]
    fn test_lag() {
        let tx = channel::<u64>(16);
        let mut rx = tx.subscribe();

        tx.send(1);
        tx.send(2);
        assert_eq!(rx.lag(), 2);

        rx.recv();
        assert_eq!(rx.lag(), 1);
    }

    #[test]
    fn test_cloned_senders_close_on_last_drop() {
        let tx = channel::<u64>(4);
        let tx2 = tx.clone();
        let rx = tx.subscribe();

        drop(tx);
        assert!(rx.is_connected());
        tx2.send(7);
        drop(tx2);
        assert!(!rx.is_connected());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let tx = channel::<u64>(0);
        let mut rx = tx.subscribe();
        tx.send(9);
        assert_eq!(tx.len(), 1);
        assert_eq!(rx.recv(), Some(9));
    }
}
