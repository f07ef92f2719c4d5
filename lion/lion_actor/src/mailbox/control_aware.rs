//! Mailbox that lets control signals overtake regular traffic.

use super::{Mailbox, UnboundedMailbox};
use crate::actor::Envelope;
use lion_core::error::MailboxError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Two-lane mailbox: control envelopes (see
/// [`ControlMessage`](crate::actor::ControlMessage)) go to a FIFO control
/// lane that is always drained first; everything else goes to the wrapped
/// mailbox, which keeps its own ordering, capacity and backpressure.
///
/// A waiting consumer parks on a condition variable rung by every accepted
/// enqueue, so it wakes for either lane without polling.
pub struct ControlAwareMailbox<M> {
    control: Mutex<VecDeque<Envelope<M>>>,
    regular: Box<dyn Mailbox<M>>,
    closed: AtomicBool,
    // Held while the consumer checks both lanes and while producers ring,
    // so an arrival between the check and the wait is never missed.
    doorbell: Mutex<()>,
    arrived: Condvar,
}

impl<M: Send + 'static> ControlAwareMailbox<M> {
    /// Control lane in front of an unbounded FIFO.
    pub fn new() -> Self {
        Self::wrap(Box::new(UnboundedMailbox::new()))
    }
}

impl<M: Send + 'static> Default for ControlAwareMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ControlAwareMailbox<M> {
    /// Control lane in front of an arbitrary mailbox for regular messages.
    pub fn wrap(regular: Box<dyn Mailbox<M>>) -> Self {
        Self {
            control: Mutex::new(VecDeque::new()),
            regular,
            closed: AtomicBool::new(false),
            doorbell: Mutex::new(()),
            arrived: Condvar::new(),
        }
    }

    /// Number of pending control envelopes.
    pub fn control_size(&self) -> usize {
        self.control.lock().len()
    }

    fn pop_control(&self) -> Option<Envelope<M>> {
        self.control.lock().pop_front()
    }

    fn ring(&self) {
        let _guard = self.doorbell.lock();
        self.arrived.notify_all();
    }
}

impl<M: Send> ControlAwareMailbox<M> {
    fn pop_next(&self) -> Option<Envelope<M>> {
        self.pop_control()
            .or_else(|| self.regular.dequeue(Some(Duration::ZERO)))
    }
}

impl<M: Send> Mailbox<M> for ControlAwareMailbox<M> {
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MailboxError::Closed);
        }
        if envelope.is_control() {
            self.control.lock().push_back(envelope);
        } else {
            self.regular.try_enqueue(envelope)?;
        }
        self.ring();
        Ok(())
    }

    fn dequeue(&self, timeout: Option<Duration>) -> Option<Envelope<M>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let mut guard = self.doorbell.lock();
        loop {
            if let Some(envelope) = self.pop_next() {
                return Some(envelope);
            }
            if self.is_closed() {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.arrived.wait_until(&mut guard, deadline).timed_out() {
                        return self.pop_next();
                    }
                }
                None => self.arrived.wait(&mut guard),
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.control.lock().is_empty() && self.regular.is_empty()
    }

    fn size(&self) -> usize {
        self.control.lock().len() + self.regular.size()
    }

    fn clear(&self) -> Vec<Envelope<M>> {
        let mut drained: Vec<_> = self.control.lock().drain(..).collect();
        drained.extend(self.regular.clear());
        drained
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.regular.close();
        self.ring();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<M> fmt::Debug for ControlAwareMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlAwareMailbox")
            .field("control", &self.control.lock().len())
            .field("regular", &self.regular.size())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}
