//! Actor mailboxes.
//!
//! A mailbox is the queue of undelivered envelopes for one actor. Any number
//! of senders may enqueue concurrently; the actor's own processing loop is the
//! only consumer. `size`, `is_empty` and `clear` may additionally be called
//! from monitoring threads.
//!
//! Five variants are provided:
//!
//! - [`UnboundedMailbox`]: FIFO, no capacity limit, blocking dequeue
//! - [`BoundedMailbox`]: FIFO with a fixed capacity and optional push timeout
//! - [`PriorityMailbox`]: highest priority first, FIFO within a priority
//! - [`ControlAwareMailbox`]: control signals overtake regular messages
//! - [`DeadLetterMailbox`]: bounded sink that evicts its oldest entry when full

pub mod bounded;
pub mod control_aware;
pub mod dead_letter;
pub mod priority;
pub mod unbounded;

pub use bounded::BoundedMailbox;
pub use control_aware::ControlAwareMailbox;
pub use dead_letter::DeadLetterMailbox;
pub use priority::PriorityMailbox;
pub use unbounded::UnboundedMailbox;

use crate::actor::Envelope;
use lion_core::error::{ConfigError, MailboxError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue of pending envelopes for one actor.
pub trait Mailbox<M>: Send + Sync {
    /// Append an envelope, reporting why it was refused.
    fn try_enqueue(&self, envelope: Envelope<M>) -> Result<(), MailboxError>;

    /// Append an envelope. Returns `false` if the mailbox is closed or full.
    fn enqueue(&self, envelope: Envelope<M>) -> bool {
        self.try_enqueue(envelope).is_ok()
    }

    /// Remove the next envelope, waiting up to `timeout` for one to arrive.
    ///
    /// What `None` means for the wait depends on the variant: it blocks until
    /// a message arrives or the mailbox closes for FIFO mailboxes, and polls
    /// once for the priority and dead-letter mailboxes.
    fn dequeue(&self, timeout: Option<Duration>) -> Option<Envelope<M>>;

    /// Whether no envelopes are pending.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of pending envelopes.
    fn size(&self) -> usize;

    /// Remove and return every pending envelope.
    fn clear(&self) -> Vec<Envelope<M>>;

    /// Refuse further enqueues and wake any waiting consumer. Idempotent.
    fn close(&self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Which mailbox implementation to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxKind {
    /// FIFO without capacity limit
    #[default]
    Unbounded,
    /// FIFO with a fixed capacity
    Bounded,
    /// Ordered by message priority
    Priority,
    /// Control signals first, regular messages in an unbounded FIFO
    ControlAware,
    /// Drop-oldest sink for undeliverable messages
    DeadLetter,
}

/// Mailbox configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Mailbox implementation
    #[serde(default)]
    pub kind: MailboxKind,

    /// Capacity of a bounded mailbox
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// How long a bounded mailbox lets a sender wait for space (milliseconds).
    /// Without it a full mailbox rejects immediately.
    #[serde(default)]
    pub push_timeout_ms: Option<u64>,

    /// Number of entries a dead-letter mailbox retains
    #[serde(default = "default_dead_letter_max_size")]
    pub dead_letter_max_size: usize,
}

fn default_capacity() -> usize {
    1000
}

fn default_dead_letter_max_size() -> usize {
    1000
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            kind: MailboxKind::default(),
            capacity: default_capacity(),
            push_timeout_ms: None,
            dead_letter_max_size: default_dead_letter_max_size(),
        }
    }
}

impl MailboxConfig {
    /// Configuration for a mailbox of the given kind with default limits.
    pub fn of_kind(kind: MailboxKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Push timeout as a duration.
    pub fn push_timeout(&self) -> Option<Duration> {
        self.push_timeout_ms.map(Duration::from_millis)
    }

    /// Check limits for the selected kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == MailboxKind::Bounded && self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "bounded mailbox capacity cannot be zero".to_string(),
            ));
        }
        if self.kind == MailboxKind::DeadLetter && self.dead_letter_max_size == 0 {
            return Err(ConfigError::Invalid(
                "dead letter max size cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the configured mailbox.
    pub fn build<M: Send + 'static>(&self) -> Box<dyn Mailbox<M>> {
        match self.kind {
            MailboxKind::Unbounded => Box::new(UnboundedMailbox::new()),
            MailboxKind::Bounded => {
                let mailbox = BoundedMailbox::new(self.capacity);
                match self.push_timeout() {
                    Some(timeout) => Box::new(mailbox.with_push_timeout(timeout)),
                    None => Box::new(mailbox),
                }
            }
            MailboxKind::Priority => Box::new(PriorityMailbox::new()),
            MailboxKind::ControlAware => Box::new(ControlAwareMailbox::new()),
            MailboxKind::DeadLetter => Box::new(DeadLetterMailbox::new(self.dead_letter_max_size)),
        }
    }
}
