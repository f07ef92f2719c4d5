//! The FSM actor and its handler registration table.

use super::builder::StateBuilder;
use super::state::{FsmEvent, State, StateTimeout};
use crate::actor::ActorContext;
use crate::scheduler::TimerHandle;
use log::{debug, trace};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Message type of the FSM actor running `F`.
pub type FsmMessage<F> = FsmEvent<<F as FsmBehavior>::State, <F as FsmBehavior>::Event>;

/// State type of the FSM actor running `F`.
pub type FsmState<F> = State<<F as FsmBehavior>::State, <F as FsmBehavior>::Data>;

/// Behavior of a finite state machine actor.
///
/// An implementation names its states, the data carried between them and
/// the events it reacts to, and registers one handler per state.
pub trait FsmBehavior: Sized + Send + 'static {
    /// State identifier, usually a fieldless enum.
    type State: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + 'static;
    /// Data carried in every state.
    type Data: Clone + Send + 'static;
    /// Events the actor receives from other actors.
    type Event: Send + 'static;

    /// State entered when the actor starts.
    fn initial_state(&self) -> FsmState<Self>;

    /// Register the per-state handlers.
    fn register(&self, handlers: &mut HandlerTable<Self>);

    /// Called on every transition between differently named states, before
    /// the actor's current state is replaced.
    fn on_transition(&mut self, _from: &FsmState<Self>, _to: &FsmState<Self>) {}
}

type Handler<F> = Box<
    dyn Fn(
            &mut F,
            &StateContext<'_, <F as FsmBehavior>::State, <F as FsmBehavior>::Data>,
            &FsmMessage<F>,
        ) -> Option<FsmState<F>>
        + Send,
>;

fn boxed<F, H, R>(handler: H) -> Handler<F>
where
    F: FsmBehavior,
    H: Fn(&mut F, &StateContext<'_, F::State, F::Data>, &FsmMessage<F>) -> R + Send + 'static,
    R: Into<Option<FsmState<F>>>,
{
    Box::new(
        move |fsm: &mut F, ctx: &StateContext<'_, F::State, F::Data>, event: &FsmMessage<F>| {
            handler(fsm, ctx, event).into()
        },
    )
}

/// Maps states to their event handlers.
///
/// A handler returns the next state, either as a [`State`], a
/// [`StateBuilder`], or `None` to stay put without touching the data.
pub struct HandlerTable<F: FsmBehavior> {
    by_state: HashMap<F::State, Handler<F>>,
    by_name: HashMap<String, Handler<F>>,
}

impl<F: FsmBehavior> HandlerTable<F> {
    fn new() -> Self {
        Self {
            by_state: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Handle events received in `state`.
    pub fn when<H, R>(&mut self, state: F::State, handler: H) -> &mut Self
    where
        H: Fn(&mut F, &StateContext<'_, F::State, F::Data>, &FsmMessage<F>) -> R + Send + 'static,
        R: Into<Option<FsmState<F>>>,
    {
        self.by_state.insert(state, boxed(handler));
        self
    }

    /// Handle events received in the state whose `Display` form is `name`.
    ///
    /// Consulted only when no handler was registered with [`when`](Self::when)
    /// for the state itself.
    pub fn when_named<H, R>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: Fn(&mut F, &StateContext<'_, F::State, F::Data>, &FsmMessage<F>) -> R + Send + 'static,
        R: Into<Option<FsmState<F>>>,
    {
        self.by_name.insert(name.into(), boxed(handler));
        self
    }

    fn lookup(&self, state: &F::State) -> Option<&Handler<F>> {
        self.by_state
            .get(state)
            .or_else(|| self.by_name.get(&state.to_string()))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.by_state.len() + self.by_name.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The current state as seen by a handler, and the DSL for choosing the
/// next one.
pub struct StateContext<'a, S, D> {
    current: &'a State<S, D>,
    unhandled: Cell<bool>,
}

impl<'a, S: Clone, D: Clone> StateContext<'a, S, D> {
    fn new(current: &'a State<S, D>) -> Self {
        Self {
            current,
            unhandled: Cell::new(false),
        }
    }

    /// Name of the current state.
    pub fn state_name(&self) -> &S {
        self.current.name()
    }

    /// Data of the current state.
    pub fn data(&self) -> &D {
        self.current.data()
    }

    /// Move to `state`, carrying the current data over unchanged.
    pub fn goto(&self, state: S) -> StateBuilder<S, D> {
        StateBuilder::new(state, self.current.data().clone(), None)
    }

    /// Remain in the current state. Returning this never counts as a
    /// transition, whatever data it carries.
    pub fn stay(&self) -> StateBuilder<S, D> {
        StateBuilder::new(
            self.current.name().clone(),
            self.current.data().clone(),
            self.current.timeout(),
        )
    }

    /// Mark the event as not understood in this state. It is passed to the
    /// actor's unhandled hook once the handler returns.
    pub fn unhandled(&self) {
        self.unhandled.set(true);
    }
}

/// Actor whose behavior is a finite state machine.
///
/// The runtime calls [`pre_start`](Self::pre_start) once and then
/// [`receive`](Self::receive) for every message taken from the actor's
/// mailbox. State timeouts are scheduled through the [`ActorContext`] and
/// come back as [`FsmEvent::StateTimeout`] messages.
pub struct FsmActor<F: FsmBehavior> {
    behavior: F,
    handlers: HandlerTable<F>,
    state: Option<FsmState<F>>,
    timeout: Option<TimerHandle>,
    generation: u64,
}

impl<F: FsmBehavior> FsmActor<F> {
    /// Wrap `behavior`, collecting its handlers.
    pub fn new(behavior: F) -> Self {
        let mut handlers = HandlerTable::new();
        behavior.register(&mut handlers);
        Self {
            behavior,
            handlers,
            state: None,
            timeout: None,
            generation: 0,
        }
    }

    /// Enter the initial state. Does nothing if already started.
    pub fn pre_start<C>(&mut self, ctx: &C)
    where
        C: ActorContext<FsmMessage<F>> + ?Sized,
    {
        if self.state.is_some() {
            return;
        }
        let initial = self.behavior.initial_state();
        debug!(
            "FSM {} starting in state {}",
            ctx.self_ref(),
            initial.name()
        );
        self.schedule_timeout(ctx, &initial);
        self.state = Some(initial);
    }

    /// Cancel the pending state timeout, if any.
    pub fn post_stop<C>(&mut self, ctx: &C)
    where
        C: ActorContext<FsmMessage<F>> + ?Sized,
    {
        if let Some(handle) = self.timeout.take() {
            ctx.cancel_schedule(&handle);
        }
    }

    /// Dispatch one event to the handler of the current state.
    ///
    /// Events for a state without a handler, and events the handler marks
    /// as unhandled, go to [`ActorContext::unhandled`].
    pub fn receive<C>(&mut self, ctx: &C, event: FsmMessage<F>)
    where
        C: ActorContext<FsmMessage<F>> + ?Sized,
    {
        self.pre_start(ctx);
        let Some(current) = self.state.as_ref() else {
            return;
        };

        if let FsmEvent::StateTimeout(timeout) = &event {
            if !self.is_current_timeout(current, timeout) {
                trace!(
                    "FSM {} ignoring stale timeout for state {}",
                    ctx.self_ref(),
                    timeout.state_name()
                );
                return;
            }
        }

        let Some(handler) = self.handlers.lookup(current.name()) else {
            debug!(
                "FSM {} has no handler for state {}",
                ctx.self_ref(),
                current.name()
            );
            ctx.unhandled(event);
            return;
        };

        let state_ctx = StateContext::new(current);
        let next = handler(&mut self.behavior, &state_ctx, &event);
        let unhandled = state_ctx.unhandled.get();

        if unhandled {
            debug!(
                "FSM {} did not handle event in state {}",
                ctx.self_ref(),
                current.name()
            );
            ctx.unhandled(event);
        }
        if let Some(next) = next {
            self.apply(ctx, next);
        }
    }

    fn is_current_timeout(&self, current: &FsmState<F>, timeout: &StateTimeout<F::State>) -> bool {
        timeout.generation() == self.generation && timeout.state_name() == current.name()
    }

    fn apply<C>(&mut self, ctx: &C, next: FsmState<F>)
    where
        C: ActorContext<FsmMessage<F>> + ?Sized,
    {
        let Some(current) = self.state.take() else {
            self.state = Some(next);
            return;
        };

        if current.name() == next.name() {
            // In-place update: the pending timeout keeps running.
            self.state = Some(next);
            return;
        }

        if let Some(handle) = self.timeout.take() {
            ctx.cancel_schedule(&handle);
        }
        self.generation = self.generation.wrapping_add(1);

        self.behavior.on_transition(&current, &next);
        debug!(
            "FSM {} transition {} -> {}",
            ctx.self_ref(),
            current.name(),
            next.name()
        );

        self.schedule_timeout(ctx, &next);
        self.state = Some(next);
    }

    fn schedule_timeout<C>(&mut self, ctx: &C, state: &FsmState<F>)
    where
        C: ActorContext<FsmMessage<F>> + ?Sized,
    {
        if let Some(delay) = state.timeout() {
            let timeout = StateTimeout::new(state.name().clone(), self.generation);
            self.timeout = Some(ctx.schedule_once(delay, FsmEvent::StateTimeout(timeout)));
        }
    }

    /// Current state, once started.
    pub fn state(&self) -> Option<&FsmState<F>> {
        self.state.as_ref()
    }

    /// Name of the current state, once started.
    pub fn state_name(&self) -> Option<&F::State> {
        self.state.as_ref().map(State::name)
    }

    /// Data of the current state, once started.
    pub fn state_data(&self) -> Option<&F::Data> {
        self.state.as_ref().map(State::data)
    }

    /// Whether a state timeout is scheduled and has not fired yet.
    pub fn has_pending_timeout(&self) -> bool {
        self.timeout.as_ref().is_some_and(TimerHandle::is_pending)
    }

    /// The wrapped behavior.
    pub fn behavior(&self) -> &F {
        &self.behavior
    }
}

impl<F: FsmBehavior + fmt::Debug> fmt::Debug for FsmActor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmActor")
            .field("behavior", &self.behavior)
            .field("state", &self.state_name())
            .field("handlers", &self.handlers.len())
            .field("pending_timeout", &self.has_pending_timeout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorRef;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Records what the FSM asked of the runtime, without any timers.
    struct RecordingContext {
        self_ref: ActorRef,
        scheduled: Mutex<Vec<(Duration, TimerHandle)>>,
        cancelled: Mutex<usize>,
        unhandled: Mutex<Vec<FsmEvent<Light, Switch>>>,
    }

    impl RecordingContext {
        fn new() -> Self {
            Self {
                self_ref: ActorRef::new("light"),
                scheduled: Mutex::new(Vec::new()),
                cancelled: Mutex::new(0),
                unhandled: Mutex::new(Vec::new()),
            }
        }
    }

    impl ActorContext<FsmEvent<Light, Switch>> for RecordingContext {
        fn self_ref(&self) -> &ActorRef {
            &self.self_ref
        }

        fn schedule_once(&self, delay: Duration, _message: FsmEvent<Light, Switch>) -> TimerHandle {
            // Never fires; the tests deliver timeouts by hand
            let handle = TimerHandle::pending();
            self.scheduled.lock().push((delay, handle.clone()));
            handle
        }

        fn cancel_schedule(&self, handle: &TimerHandle) {
            if handle.cancel() {
                *self.cancelled.lock() += 1;
            }
        }

        fn unhandled(&self, message: FsmEvent<Light, Switch>) {
            self.unhandled.lock().push(message);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Off,
        On,
        Broken,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                Light::Off => "off",
                Light::On => "on",
                Light::Broken => "broken",
            };
            f.write_str(name)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Switch {
        Toggle,
        Touch,
        Smash,
    }

    #[derive(Debug, Default)]
    struct LightSwitch {
        transitions: Vec<(Light, Light)>,
    }

    impl FsmBehavior for LightSwitch {
        type State = Light;
        type Data = u32;
        type Event = Switch;

        fn initial_state(&self) -> FsmState<Self> {
            State::new(Light::Off, 0)
        }

        fn register(&self, handlers: &mut HandlerTable<Self>) {
            handlers
                .when(Light::Off, |_, ctx, event| match event.message() {
                    Some(Switch::Toggle) => Some(
                        ctx.goto(Light::On)
                            .using(ctx.data() + 1)
                            .for_max(Duration::from_secs(5))
                            .build(),
                    ),
                    Some(Switch::Smash) => Some(ctx.goto(Light::Broken).build()),
                    _ => {
                        ctx.unhandled();
                        None
                    }
                })
                .when_named("on", |_, ctx, event| match event {
                    FsmEvent::Message(Switch::Toggle) | FsmEvent::StateTimeout(_) => {
                        Some(ctx.goto(Light::Off).build())
                    }
                    FsmEvent::Message(Switch::Touch) => Some(ctx.stay().build()),
                    FsmEvent::Message(Switch::Smash) => Some(ctx.goto(Light::Broken).build()),
                });
        }

        fn on_transition(&mut self, from: &FsmState<Self>, to: &FsmState<Self>) {
            self.transitions.push((*from.name(), *to.name()));
        }
    }

    #[test]
    fn test_start_in_initial_state() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        assert_eq!(fsm.state_name(), None);

        fsm.pre_start(&ctx);
        assert_eq!(fsm.state_name(), Some(&Light::Off));
        assert_eq!(fsm.state_data(), Some(&0));
        assert!(!fsm.has_pending_timeout());
    }

    #[test]
    fn test_transition_schedules_timeout_and_notifies() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        fsm.pre_start(&ctx);

        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        assert_eq!(fsm.state_name(), Some(&Light::On));
        assert_eq!(fsm.state_data(), Some(&1));
        assert!(fsm.has_pending_timeout());
        assert_eq!(ctx.scheduled.lock().len(), 1);
        assert_eq!(ctx.scheduled.lock()[0].0, Duration::from_secs(5));
        assert_eq!(fsm.behavior().transitions, vec![(Light::Off, Light::On)]);

        // Leaving the state cancels its timeout
        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        assert_eq!(fsm.state_name(), Some(&Light::Off));
        assert_eq!(*ctx.cancelled.lock(), 1);
        assert!(!fsm.has_pending_timeout());
    }

    #[test]
    fn test_stay_is_not_a_transition() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));

        for _ in 0..3 {
            fsm.receive(&ctx, FsmEvent::Message(Switch::Touch));
        }
        assert_eq!(fsm.behavior().transitions.len(), 1);
        assert_eq!(ctx.scheduled.lock().len(), 1);
        assert_eq!(*ctx.cancelled.lock(), 0);
        assert!(fsm.has_pending_timeout());
    }

    #[test]
    fn test_missing_handler_goes_to_unhandled() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        fsm.receive(&ctx, FsmEvent::Message(Switch::Smash));
        assert_eq!(fsm.state_name(), Some(&Light::Broken));

        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        assert_eq!(fsm.state_name(), Some(&Light::Broken));
        assert_eq!(*ctx.unhandled.lock(), vec![FsmEvent::Message(Switch::Toggle)]);
    }

    #[test]
    fn test_handler_can_reject_event() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        fsm.receive(&ctx, FsmEvent::Message(Switch::Touch));

        assert_eq!(fsm.state_name(), Some(&Light::Off));
        assert_eq!(*ctx.unhandled.lock(), vec![FsmEvent::Message(Switch::Touch)]);
    }

    #[test]
    fn test_stale_timeout_is_dropped() {
        let ctx = RecordingContext::new();
        let mut fsm = FsmActor::new(LightSwitch::default());
        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        let stale = StateTimeout::new(Light::On, fsm.generation);

        // Off and on again: the first timeout belongs to the earlier visit
        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        fsm.receive(&ctx, FsmEvent::Message(Switch::Toggle));
        fsm.receive(&ctx, FsmEvent::StateTimeout(stale));
        assert_eq!(fsm.state_name(), Some(&Light::On));

        let current = StateTimeout::new(Light::On, fsm.generation);
        fsm.receive(&ctx, FsmEvent::StateTimeout(current));
        assert_eq!(fsm.state_name(), Some(&Light::Off));
        assert!(ctx.unhandled.lock().is_empty());
    }
}
