//! Sink for messages that could not be delivered.

use super::Mailbox;
use crate::actor::Envelope;
use lion_core::error::MailboxError;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct DeadLetters<M> {
    entries: VecDeque<Envelope<M>>,
    closed: bool,
}

/// Bounded FIFO that keeps the most recent `max_size` dead letters.
///
/// Accepting an envelope while full evicts the oldest one and bumps
/// [`dropped_count`](Self::dropped_count), so an open dead-letter mailbox
/// never rejects. `dequeue(None)` polls without waiting.
pub struct DeadLetterMailbox<M> {
    letters: Mutex<DeadLetters<M>>,
    available: Condvar,
    max_size: usize,
    dropped: AtomicU64,
}

impl<M> DeadLetterMailbox<M> {
    /// Create a sink retaining at most `max_size` envelopes (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            letters: Mutex::new(DeadLetters {
                entries: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            max_size: max_size.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Maximum number of retained envelopes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of envelopes evicted to make room for newer ones.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<M: Send> Mailbox<M> for DeadLetterMailbox<M> {
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError> {
        let mut letters = self.letters.lock();
        if letters.closed {
            return Err(MailboxError::Closed);
        }

        debug!(
            "Dead letter: {} from {}",
            envelope.message_type(),
            envelope
                .sender()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string())
        );
        letters.entries.push_back(envelope);
        while letters.entries.len() > self.max_size {
            letters.entries.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Dead letter queue full, evicted oldest (dropped total: {})", dropped);
        }
        drop(letters);

        self.available.notify_one();
        Ok(())
    }

    fn dequeue(&self, timeout: Option<Duration>) -> Option<Envelope<M>> {
        let mut letters = self.letters.lock();
        let Some(timeout) = timeout else {
            return letters.entries.pop_front();
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(envelope) = letters.entries.pop_front() {
                return Some(envelope);
            }
            if letters.closed {
                return None;
            }
            if self.available.wait_until(&mut letters, deadline).timed_out() {
                return letters.entries.pop_front();
            }
        }
    }

    fn size(&self) -> usize {
        self.letters.lock().entries.len()
    }

    fn clear(&self) -> Vec<Envelope<M>> {
        self.letters.lock().entries.drain(..).collect()
    }

    fn close(&self) {
        self.letters.lock().closed = true;
        self.available.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.letters.lock().closed
    }
}

impl<M> fmt::Debug for DeadLetterMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetterMailbox")
            .field("size", &self.letters.lock().entries.len())
            .field("max_size", &self.max_size)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}
