//! FSM states and the events an FSM actor receives.

use std::time::Duration;

/// A named state together with the data carried in it.
///
/// A state may declare a timeout: if no transition happens within it, a
/// [`StateTimeout`] for the state is delivered to the actor.
#[derive(Debug, Clone, PartialEq)]
pub struct State<S, D> {
    name: S,
    data: D,
    timeout: Option<Duration>,
}

impl<S, D> State<S, D> {
    /// State without a timeout.
    pub fn new(name: S, data: D) -> Self {
        Self {
            name,
            data,
            timeout: None,
        }
    }

    /// Set the state timeout. A zero duration means no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// State identifier.
    pub fn name(&self) -> &S {
        &self.name
    }

    /// Data carried in the state.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Timeout, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Take the state apart.
    pub fn into_parts(self) -> (S, D, Option<Duration>) {
        (self.name, self.data, self.timeout)
    }
}

/// Notification that the actor stayed in `state_name` for its whole timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTimeout<S> {
    state_name: S,
    // Which entry into the state scheduled the timeout.
    generation: u64,
}

impl<S> StateTimeout<S> {
    pub(crate) fn new(state_name: S, generation: u64) -> Self {
        Self {
            state_name,
            generation,
        }
    }

    /// The state that timed out.
    pub fn state_name(&self) -> &S {
        &self.state_name
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Message type of an FSM actor: a user event or a state timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum FsmEvent<S, E> {
    /// An event sent by another actor
    Message(E),
    /// The current state's timeout expired
    StateTimeout(StateTimeout<S>),
}

impl<S, E> FsmEvent<S, E> {
    /// The user event, if this is one.
    pub fn message(&self) -> Option<&E> {
        match self {
            Self::Message(event) => Some(event),
            Self::StateTimeout(_) => None,
        }
    }

    /// Whether this is a state timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StateTimeout(_))
    }
}

impl<S, E> From<StateTimeout<S>> for FsmEvent<S, E> {
    fn from(timeout: StateTimeout<S>) -> Self {
        Self::StateTimeout(timeout)
    }
}
