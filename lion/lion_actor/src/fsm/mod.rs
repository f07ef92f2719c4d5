//! Finite state machine actors.
//!
//! An [`FsmBehavior`] names its states and registers one handler per state
//! in a [`HandlerTable`]. [`FsmActor`] runs the behavior: it routes every
//! event to the handler of the current state, applies the state the handler
//! returns and manages state timeouts through the actor's
//! [`ActorContext`](crate::actor::ActorContext).
//!
//! Returning a state with the same name as the current one updates its data
//! in place: `on_transition` is not called and a pending timeout keeps
//! running. A transition to a differently named state runs, in order:
//!
//! 1. cancel the outgoing state's timeout
//! 2. `on_transition(old, new)`
//! 3. replace the current state
//! 4. schedule the new state's timeout, if it has one

pub mod actor;
pub mod builder;
pub mod state;

pub use actor::{FsmActor, FsmBehavior, FsmMessage, FsmState, HandlerTable, StateContext};
pub use builder::StateBuilder;
pub use state::{FsmEvent, State, StateTimeout};
