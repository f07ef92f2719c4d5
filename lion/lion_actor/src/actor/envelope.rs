//! Message envelopes.
//!
//! Every message travels through a mailbox wrapped in an [`Envelope`] that
//! records who sent it and how urgent it is. Control signals (poison pills,
//! kills, lifecycle signals) are a closed set carried in the same envelope
//! type so control-aware mailboxes can route them ahead of user traffic.

use super::refs::ActorRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering class used by the priority mailbox. Higher is more urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MessagePriority {
    /// Background traffic
    Low = 0,
    /// Regular traffic
    #[default]
    Normal = 1,
    /// Traffic that should overtake normal messages
    High = 2,
    /// Traffic that must be handled as soon as possible
    Critical = 3,
    /// Runtime generated signals
    System = 4,
}

impl MessagePriority {
    /// Numeric ordinal of this priority.
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Signals the runtime sends to an actor outside its user protocol.
///
/// This is the complete set of messages a control-aware mailbox treats as
/// control traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop after the messages already enqueued have been processed
    PoisonPill,
    /// Stop immediately, failing the actor
    Kill,
    /// Stop taking user messages until resumed
    Suspend,
    /// Resume after a suspend
    Resume,
    /// Restart the actor, discarding its state
    Restart,
    /// A watched child has terminated
    ChildTerminated(ActorRef),
}

impl ControlMessage {
    /// Name of the signal, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PoisonPill => "PoisonPill",
            Self::Kill => "Kill",
            Self::Suspend => "Suspend",
            Self::Resume => "Resume",
            Self::Restart => "Restart",
            Self::ChildTerminated(_) => "ChildTerminated",
        }
    }
}

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<M> {
    /// A message from the actor's own protocol
    User(M),
    /// A runtime control signal
    Control(ControlMessage),
}

/// A message plus its delivery metadata.
///
/// Envelopes are immutable: the builder methods consume and return the
/// envelope, and there are no setters once it has been enqueued.
#[derive(Clone, PartialEq)]
pub struct Envelope<M> {
    payload: Payload<M>,
    sender: Option<ActorRef>,
    priority: MessagePriority,
}

impl<M> Envelope<M> {
    /// Wrap a user message with normal priority and no sender.
    pub fn new(message: M) -> Self {
        Self {
            payload: Payload::User(message),
            sender: None,
            priority: MessagePriority::Normal,
        }
    }

    /// Wrap a control signal. Control envelopes carry system priority.
    pub fn control(signal: ControlMessage) -> Self {
        Self {
            payload: Payload::Control(signal),
            sender: None,
            priority: MessagePriority::System,
        }
    }

    /// Record the sender.
    pub fn with_sender(mut self, sender: ActorRef) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// The carried payload.
    pub fn payload(&self) -> &Payload<M> {
        &self.payload
    }

    /// The user message, if this is not a control envelope.
    pub fn message(&self) -> Option<&M> {
        match &self.payload {
            Payload::User(message) => Some(message),
            Payload::Control(_) => None,
        }
    }

    /// The control signal, if this is a control envelope.
    pub fn control_message(&self) -> Option<&ControlMessage> {
        match &self.payload {
            Payload::Control(signal) => Some(signal),
            Payload::User(_) => None,
        }
    }

    /// Who sent this envelope, if known.
    pub fn sender(&self) -> Option<&ActorRef> {
        self.sender.as_ref()
    }

    /// Delivery priority.
    pub fn priority(&self) -> MessagePriority {
        self.priority
    }

    /// Whether this envelope carries a control signal.
    pub fn is_control(&self) -> bool {
        matches!(self.payload, Payload::Control(_))
    }

    /// Type name of the carried message, used when logging dropped envelopes.
    pub fn message_type(&self) -> &'static str {
        match &self.payload {
            Payload::User(_) => std::any::type_name::<M>(),
            Payload::Control(signal) => signal.name(),
        }
    }

    /// Unwrap the payload.
    pub fn into_payload(self) -> Payload<M> {
        self.payload
    }

    /// Unwrap the user message, discarding metadata.
    pub fn into_message(self) -> Option<M> {
        match self.payload {
            Payload::User(message) => Some(message),
            Payload::Control(_) => None,
        }
    }
}

impl<M> fmt::Debug for Envelope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("message_type", &self.message_type())
            .field("sender", &self.sender)
            .field("priority", &self.priority)
            .finish()
    }
}
