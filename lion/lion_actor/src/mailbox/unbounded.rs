//! Unbounded FIFO mailbox, the default for new actors.

use super::Mailbox;
use crate::actor::Envelope;
use crossbeam_channel::{unbounded, Receiver, Sender};
use lion_core::error::MailboxError;
use log::trace;
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;

/// FIFO mailbox without a capacity limit.
///
/// `dequeue(None)` blocks until a message arrives or the mailbox is closed.
/// Closing drops the mailbox's sending side, which wakes a blocked consumer
/// once the queue is drained.
pub struct UnboundedMailbox<M> {
    sender: RwLock<Option<Sender<Envelope<M>>>>,
    receiver: Receiver<Envelope<M>>,
}

impl<M> UnboundedMailbox<M> {
    /// Create an empty, open mailbox.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: RwLock::new(Some(sender)),
            receiver,
        }
    }
}

impl<M> Default for UnboundedMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send> Mailbox<M> for UnboundedMailbox<M> {
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError> {
        let sender = self.sender.read();
        match sender.as_ref() {
            Some(sender) => sender.send(envelope).map_err(|_| MailboxError::Closed),
            None => Err(MailboxError::Closed),
        }
    }

    fn dequeue(&self, timeout: Option<Duration>) -> Option<Envelope<M>> {
        match timeout {
            Some(timeout) => self.receiver.recv_timeout(timeout).ok(),
            None => self.receiver.recv().ok(),
        }
    }

    fn size(&self) -> usize {
        self.receiver.len()
    }

    fn clear(&self) -> Vec<Envelope<M>> {
        let pending = self.receiver.len();
        self.receiver.try_iter().take(pending).collect()
    }

    fn close(&self) {
        if self.sender.write().take().is_some() {
            trace!("Unbounded mailbox closed with {} pending", self.receiver.len());
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }
}

impl<M> fmt::Debug for UnboundedMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundedMailbox")
            .field("size", &self.receiver.len())
            .field("closed", &self.sender.read().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let mailbox = UnboundedMailbox::new();
        for i in 0..5 {
            assert!(mailbox.enqueue(Envelope::new(i)));
        }
        assert_eq!(mailbox.size(), 5);

        for i in 0..5 {
            assert_eq!(mailbox.dequeue(None).unwrap().into_message(), Some(i));
        }
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_dequeue_timeout_on_empty() {
        let mailbox: UnboundedMailbox<u32> = UnboundedMailbox::new();
        let start = Instant::now();
        assert!(mailbox.dequeue(Some(Duration::from_millis(20))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_clear_returns_pending() {
        let mailbox = UnboundedMailbox::new();
        mailbox.enqueue(Envelope::new("a"));
        mailbox.enqueue(Envelope::new("b"));

        let drained: Vec<_> = mailbox
            .clear()
            .into_iter()
            .filter_map(Envelope::into_message)
            .collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_close_rejects_enqueue() {
        let mailbox = UnboundedMailbox::new();
        mailbox.close();
        mailbox.close();
        assert!(mailbox.is_closed());
        assert!(!mailbox.enqueue(Envelope::new(1)));
        assert_eq!(
            mailbox.try_enqueue(Envelope::new(2)),
            Err(MailboxError::Closed)
        );
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let mailbox: Arc<UnboundedMailbox<u32>> = Arc::new(UnboundedMailbox::new());
        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.dequeue(None))
        };

        thread::sleep(Duration::from_millis(30));
        mailbox.close();

        let result = consumer.join().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_many_producers() {
        let mailbox: Arc<UnboundedMailbox<usize>> = Arc::new(UnboundedMailbox::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        assert!(mailbox.enqueue(Envelope::new(p * 100 + i)));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(mailbox.size(), 400);
        assert_eq!(mailbox.clear().len(), 400);
    }
}
