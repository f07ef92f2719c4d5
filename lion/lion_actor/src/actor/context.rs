//! What an actor can ask of the runtime while it handles a message.

use super::{ActorRef, Envelope};
use crate::mailbox::Mailbox;
use crate::scheduler::{TimerHandle, TimerScheduler};
use lion_core::log_event;
use lion_core::utils::LogLevel;
use log::trace;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Runtime services available to an actor handling messages of type `M`.
pub trait ActorContext<M> {
    /// The actor being run.
    fn self_ref(&self) -> &ActorRef;

    /// Deliver `message` to this actor after `delay`.
    fn schedule_once(&self, delay: Duration, message: M) -> TimerHandle;

    /// Cancel a delivery scheduled with [`schedule_once`](Self::schedule_once).
    /// Cancelling a timer that already fired or was already cancelled does
    /// nothing.
    fn cancel_schedule(&self, handle: &TimerHandle);

    /// Called for a message the actor has no handler for. Must not fail.
    fn unhandled(&self, message: M);
}

/// [`ActorContext`] backed by the actor's own mailbox.
///
/// Scheduled messages are enqueued into `mailbox` when their timer fires.
/// Unhandled messages go to the dead-letter mailbox if one is attached, and
/// are dropped otherwise.
pub struct MailboxContext<M> {
    self_ref: ActorRef,
    mailbox: Arc<dyn Mailbox<M>>,
    scheduler: Arc<TimerScheduler>,
    dead_letters: Option<Arc<dyn Mailbox<M>>>,
}

impl<M: Send + 'static> MailboxContext<M> {
    /// Create a context for `self_ref`, whose messages arrive in `mailbox`.
    pub fn new(
        self_ref: ActorRef,
        mailbox: Arc<dyn Mailbox<M>>,
        scheduler: Arc<TimerScheduler>,
    ) -> Self {
        Self {
            self_ref,
            mailbox,
            scheduler,
            dead_letters: None,
        }
    }

    /// Route unhandled messages to `dead_letters`.
    pub fn with_dead_letters(mut self, dead_letters: Arc<dyn Mailbox<M>>) -> Self {
        self.dead_letters = Some(dead_letters);
        self
    }

    /// The actor's mailbox.
    pub fn mailbox(&self) -> &Arc<dyn Mailbox<M>> {
        &self.mailbox
    }

    /// The scheduler used for delayed delivery.
    pub fn scheduler(&self) -> &Arc<TimerScheduler> {
        &self.scheduler
    }
}

impl<M: Send + 'static> ActorContext<M> for MailboxContext<M> {
    fn self_ref(&self) -> &ActorRef {
        &self.self_ref
    }

    fn schedule_once(&self, delay: Duration, message: M) -> TimerHandle {
        let mailbox = Arc::clone(&self.mailbox);
        let envelope = Envelope::new(message).with_sender(self.self_ref.clone());
        let target = self.self_ref.clone();

        self.scheduler.schedule_once(delay, move || {
            if let Err(e) = mailbox.try_enqueue(envelope) {
                trace!("Scheduled message for {} not delivered: {}", target, e);
            }
        })
    }

    fn cancel_schedule(&self, handle: &TimerHandle) {
        self.scheduler.cancel(handle);
    }

    fn unhandled(&self, message: M) {
        let envelope = Envelope::new(message).with_sender(self.self_ref.clone());
        let message_type = envelope.message_type();

        match &self.dead_letters {
            Some(dead_letters) => {
                if let Err(e) = dead_letters.try_enqueue(envelope) {
                    trace!("Dead letter from {} dropped: {}", self.self_ref, e);
                }
            }
            None => {
                log_event!(LogLevel::Debug, "unhandled message dropped",
                    actor => self.self_ref,
                    message_type => message_type,
                );
            }
        }
    }
}

impl<M> fmt::Debug for MailboxContext<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxContext")
            .field("self_ref", &self.self_ref)
            .field("mailbox_size", &self.mailbox.size())
            .field("has_dead_letters", &self.dead_letters.is_some())
            .finish()
    }
}
