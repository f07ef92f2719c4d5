//! All-for-one supervision: one failure decides the fate of every sibling.

use super::{default_decider, ChildFailure, Decider, Directive, FailureWindow, SupervisorStrategy};
use crate::actor::ActorRef;
use lion_core::log_event;
use lion_core::utils::LogLevel;
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// Like [`OneForOneStrategy`](super::OneForOneStrategy), but the restart
/// budget is shared by the whole sibling group and the directive applies to
/// all children of the supervisor.
pub struct AllForOneStrategy {
    max_restarts: u32,
    within_time: Duration,
    decider: Decider,
    failures: Mutex<FailureWindow>,
}

impl AllForOneStrategy {
    /// Strategy with the [`default_decider`].
    pub fn new(max_restarts: u32, within_time: Duration) -> Self {
        Self {
            max_restarts,
            within_time,
            decider: default_decider(),
            failures: Mutex::new(FailureWindow::new(within_time)),
        }
    }

    /// Replace the decider.
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }

    /// Failures of any child still inside the window.
    pub fn failure_count(&self) -> usize {
        self.failures.lock().count(Instant::now())
    }
}

impl Default for AllForOneStrategy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl SupervisorStrategy for AllForOneStrategy {
    fn handle_failure(&self, failure: ChildFailure) -> Directive {
        let recent = self.failures.lock().record(Instant::now());

        let directive = (self.decider)(failure.cause());
        if directive == Directive::Restart && recent > self.max_restarts as usize {
            log_event!(LogLevel::Warning, "restart budget exceeded, stopping child group",
                strategy => self.name(),
                child => failure.child(),
                failures => recent,
                max_restarts => self.max_restarts,
                within_ms => self.within_time.as_millis(),
            );
            self.reset(failure.child());
            return Directive::Stop;
        }

        debug!(
            "Child {} failed ({}): {} for all siblings [{} in window]",
            failure.child(),
            failure.cause().kind(),
            directive,
            recent
        );
        // The whole group is stopped with the failed child
        if directive == Directive::Stop {
            self.reset(failure.child());
        }
        directive
    }

    // History is shared by the group, so a reset from any child clears it.
    fn reset(&self, _child: &ActorRef) {
        self.failures.lock().clear();
    }

    fn applies_to_all_children(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "all_for_one"
    }
}

impl fmt::Debug for AllForOneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllForOneStrategy")
            .field("max_restarts", &self.max_restarts)
            .field("within_time", &self.within_time)
            .finish()
    }
}
