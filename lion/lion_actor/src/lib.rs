#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Lion Actor
//!
//! Fault-tolerance core of the Lion actor runtime.
//!
//! This crate provides the pieces an actor runtime is assembled from:
//!
//! - Message envelopes carrying sender and priority
//! - Mailboxes: unbounded, bounded, priority ordered, control aware and dead letter
//! - Supervision strategies deciding the fate of failed children
//! - Finite state machine actors with state timeouts
//! - A one-shot timer scheduler used for delayed delivery
//!
//! The runtime itself (spawning, the processing loop, addressing) lives
//! outside this crate and drives these types through their public APIs.

/// Envelopes, actor references and the context handed to actors
pub mod actor;

/// Actor configuration loading
pub mod config;

/// Finite state machine actors
pub mod fsm;

/// Mailbox implementations
pub mod mailbox;

/// One-shot timers
pub mod scheduler;

/// Supervision strategies and directives
pub mod supervision;

pub use actor::{
    ActorContext, ActorRef, ControlMessage, Envelope, MailboxContext, MessagePriority, Payload,
};
pub use config::ActorConfig;
pub use fsm::{FsmActor, FsmBehavior, FsmEvent, HandlerTable, State, StateBuilder, StateContext};
pub use mailbox::{Mailbox, MailboxConfig, MailboxKind};
pub use scheduler::{TimerHandle, TimerScheduler};
pub use supervision::{
    ChildFailure, Directive, SupervisorConfig, SupervisorStrategy, StrategyKind,
};
