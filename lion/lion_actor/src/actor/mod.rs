//! Actor vocabulary shared by mailboxes, supervisors and FSM actors.

pub mod context;
pub mod envelope;
pub mod refs;

pub use context::{ActorContext, MailboxContext};
pub use envelope::{ControlMessage, Envelope, MessagePriority, Payload};
pub use refs::ActorRef;
