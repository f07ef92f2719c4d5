//! Fluent construction of the next state.

use super::state::State;
use std::time::Duration;

/// Next state under construction, returned by
/// [`StateContext::goto`](super::StateContext::goto) and
/// [`StateContext::stay`](super::StateContext::stay).
///
/// A handler may return the builder as is; it converts into a [`State`].
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a state builder does nothing unless returned from a handler"]
pub struct StateBuilder<S, D> {
    name: S,
    data: D,
    timeout: Option<Duration>,
}

impl<S, D> StateBuilder<S, D> {
    pub(crate) fn new(name: S, data: D, timeout: Option<Duration>) -> Self {
        Self {
            name,
            data,
            timeout,
        }
    }

    /// Replace the carried data.
    pub fn using(mut self, data: D) -> Self {
        self.data = data;
        self
    }

    /// Leave the state again if nothing happens within `timeout`.
    pub fn for_max(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Finish the state.
    pub fn build(self) -> State<S, D> {
        let state = State::new(self.name, self.data);
        match self.timeout {
            Some(timeout) => state.with_timeout(timeout),
            None => state,
        }
    }
}

impl<S, D> From<StateBuilder<S, D>> for State<S, D> {
    fn from(builder: StateBuilder<S, D>) -> Self {
        builder.build()
    }
}

impl<S, D> From<StateBuilder<S, D>> for Option<State<S, D>> {
    fn from(builder: StateBuilder<S, D>) -> Self {
        Some(builder.build())
    }
}
