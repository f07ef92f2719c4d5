//! Priority-ordered mailbox.

use super::Mailbox;
use crate::actor::{Envelope, MessagePriority};
use lion_core::error::MailboxError;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

/// Heap entry. Higher priority wins; within a priority the lower sequence
/// number (earlier arrival) wins.
struct Prioritized<M> {
    priority: MessagePriority,
    seq: u64,
    envelope: Envelope<M>,
}

impl<M> Ord for Prioritized<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<M> PartialOrd for Prioritized<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> PartialEq for Prioritized<M> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<M> Eq for Prioritized<M> {}

struct PriorityQueue<M> {
    heap: BinaryHeap<Prioritized<M>>,
    // Never reset, not even by `clear`, so FIFO tie-breaking holds for the
    // life of the mailbox.
    next_seq: u64,
    closed: bool,
}

/// Mailbox that delivers the most urgent envelope first.
///
/// Envelopes of equal priority are delivered in arrival order.
/// `dequeue(None)` does not wait: it returns `None` at once when empty.
pub struct PriorityMailbox<M> {
    queue: Mutex<PriorityQueue<M>>,
    available: Condvar,
}

impl<M> PriorityMailbox<M> {
    /// Create an empty, open mailbox.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(PriorityQueue {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }
}

impl<M> Default for PriorityMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send> Mailbox<M> for PriorityMailbox<M> {
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError> {
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(MailboxError::Closed);
        }

        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Prioritized {
            priority: envelope.priority(),
            seq,
            envelope,
        });
        drop(queue);

        self.available.notify_one();
        Ok(())
    }

    fn dequeue(&self, timeout: Option<Duration>) -> Option<Envelope<M>> {
        let mut queue = self.queue.lock();
        let Some(timeout) = timeout else {
            return queue.heap.pop().map(|entry| entry.envelope);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = queue.heap.pop() {
                return Some(entry.envelope);
            }
            if queue.closed {
                return None;
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.heap.pop().map(|entry| entry.envelope);
            }
        }
    }

    fn size(&self) -> usize {
        self.queue.lock().heap.len()
    }

    fn clear(&self) -> Vec<Envelope<M>> {
        let mut queue = self.queue.lock();
        let mut drained: Vec<_> = std::mem::take(&mut queue.heap).into_vec();
        drop(queue);

        // Hand back in delivery order
        drained.sort_by(|a, b| b.cmp(a));
        drained.into_iter().map(|entry| entry.envelope).collect()
    }

    fn close(&self) {
        self.queue.lock().closed = true;
        self.available.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }
}

impl<M> fmt::Debug for PriorityMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.lock();
        f.debug_struct("PriorityMailbox")
            .field("size", &queue.heap.len())
            .field("next_seq", &queue.next_seq)
            .field("closed", &queue.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn drain(mailbox: &PriorityMailbox<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| mailbox.dequeue(None))
            .filter_map(Envelope::into_message)
            .collect()
    }

    #[test]
    fn test_higher_priority_first() {
        let mailbox = PriorityMailbox::new();
        mailbox.enqueue(Envelope::new("low").with_priority(MessagePriority::Low));
        mailbox.enqueue(Envelope::new("normal"));
        mailbox.enqueue(Envelope::new("critical").with_priority(MessagePriority::Critical));
        mailbox.enqueue(Envelope::new("high").with_priority(MessagePriority::High));

        assert_eq!(drain(&mailbox), vec!["critical", "high", "normal", "low"]);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mailbox = PriorityMailbox::new();
        mailbox.enqueue(Envelope::new("a").with_priority(MessagePriority::High));
        mailbox.enqueue(Envelope::new("x"));
        mailbox.enqueue(Envelope::new("b").with_priority(MessagePriority::High));
        mailbox.enqueue(Envelope::new("y"));
        mailbox.enqueue(Envelope::new("c").with_priority(MessagePriority::High));

        assert_eq!(drain(&mailbox), vec!["a", "b", "c", "x", "y"]);
    }

    #[test]
    fn test_sequence_survives_clear() {
        let mailbox = PriorityMailbox::new();
        mailbox.enqueue(Envelope::new("first"));
        mailbox.enqueue(Envelope::new("second"));
        assert_eq!(mailbox.clear().len(), 2);

        mailbox.enqueue(Envelope::new("third"));
        mailbox.enqueue(Envelope::new("fourth"));
        assert_eq!(mailbox.queue.lock().next_seq, 4);
        assert_eq!(drain(&mailbox), vec!["third", "fourth"]);
    }

    #[test]
    fn test_clear_in_delivery_order() {
        let mailbox = PriorityMailbox::new();
        mailbox.enqueue(Envelope::new("n1"));
        mailbox.enqueue(Envelope::new("h1").with_priority(MessagePriority::High));
        mailbox.enqueue(Envelope::new("n2"));

        let cleared: Vec<_> = mailbox
            .clear()
            .into_iter()
            .filter_map(Envelope::into_message)
            .collect();
        assert_eq!(cleared, vec!["h1", "n1", "n2"]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_dequeue_none_does_not_block() {
        let mailbox: PriorityMailbox<u8> = PriorityMailbox::new();
        let start = Instant::now();
        assert!(mailbox.dequeue(None).is_none());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_timed_dequeue_wakes_on_enqueue() {
        let mailbox: Arc<PriorityMailbox<u8>> = Arc::new(PriorityMailbox::new());
        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.dequeue(Some(Duration::from_secs(2))))
        };

        thread::sleep(Duration::from_millis(20));
        mailbox.enqueue(Envelope::new(7));
        assert_eq!(consumer.join().unwrap().unwrap().into_message(), Some(7));
    }

    #[test]
    fn test_close_wakes_timed_dequeue() {
        let mailbox: Arc<PriorityMailbox<u8>> = Arc::new(PriorityMailbox::new());
        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.dequeue(Some(Duration::from_secs(5))))
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        mailbox.close();
        assert!(consumer.join().unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!mailbox.enqueue(Envelope::new(1)));
    }
}
