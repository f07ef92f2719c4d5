//! Bounded FIFO mailbox with backpressure.

use super::Mailbox;
use crate::actor::Envelope;
use crossbeam_channel::{bounded, Receiver, Select, Sender, TrySendError};
use lion_core::error::MailboxError;
use lion_core::log_event;
use lion_core::utils::LogLevel;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::time::{Duration, Instant};

/// FIFO mailbox holding at most `capacity` envelopes.
///
/// When full, a sender either waits up to the configured push timeout for
/// space or, without one, is rejected at once. Every rejection is logged as a
/// dropped message together with the message type. `close` releases senders
/// that are still waiting.
pub struct BoundedMailbox<M> {
    sender: RwLock<Option<Sender<Envelope<M>>>>,
    receiver: Receiver<Envelope<M>>,
    // Dropping the sender half disconnects `closed`, waking parked pushes.
    close_signal: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
    capacity: usize,
    push_timeout: Option<Duration>,
}

impl<M> BoundedMailbox<M> {
    /// Create a mailbox holding at most `capacity` envelopes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        let (close_signal, closed) = bounded(0);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            close_signal: Mutex::new(Some(close_signal)),
            closed,
            capacity,
            push_timeout: None,
        }
    }

    /// Let senders wait up to `timeout` for space instead of failing at once.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = Some(timeout);
        self
    }

    /// Maximum number of pending envelopes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured push timeout, if any.
    pub fn push_timeout(&self) -> Option<Duration> {
        self.push_timeout
    }

    /// Non-blocking push. Runs under the read lock, so once `close` has
    /// taken the sender no push can land.
    fn offer(&self, envelope: Envelope<M>) -> Result<(), TrySendError<Envelope<M>>> {
        match self.sender.read().as_ref() {
            Some(sender) => sender.try_send(envelope),
            None => Err(TrySendError::Disconnected(envelope)),
        }
    }

    /// Park until the queue may have space, the mailbox is closed or the
    /// deadline passes. Returns `false` once the deadline has passed.
    fn wait_for_space(&self, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        let Some(sender) = self.sender.read().as_ref().cloned() else {
            // Closed; the next offer reports it
            return true;
        };

        let mut select = Select::new();
        select.send(&sender);
        select.recv(&self.closed);
        select.ready_timeout(remaining).is_ok()
    }

    fn log_drop(&self, envelope: &Envelope<M>) {
        log_event!(LogLevel::Warning, "mailbox full, dropping message",
            message_type => envelope.message_type(),
            capacity => self.capacity,
        );
    }
}

impl<M: Send> Mailbox<M> for BoundedMailbox<M> {
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError> {
        let deadline = self.push_timeout.map(|timeout| Instant::now() + timeout);
        let mut envelope = envelope;

        loop {
            match self.offer(envelope) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(MailboxError::Closed),
                Err(TrySendError::Full(rejected)) => {
                    // Another sender may win the freed slot, so retry
                    if !deadline.is_some_and(|deadline| self.wait_for_space(deadline)) {
                        self.log_drop(&rejected);
                        return Err(MailboxError::Full);
                    }
                    envelope = rejected;
                }
            }
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
        self.sender.write().take();
        self.close_signal.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }
}

impl<M> fmt::Debug for BoundedMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMailbox")
            .field("capacity", &self.capacity)
            .field("size", &self.receiver.len())
            .field("push_timeout", &self.push_timeout)
            .finish()
    }
}
