//! One-for-one supervision: each child has its own restart budget.

use super::{default_decider, ChildFailure, Decider, Directive, FailureWindow, SupervisorStrategy};
use crate::actor::ActorRef;
use lion_core::id::ActorId;
use lion_core::log_event;
use lion_core::utils::LogLevel;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Applies the decider's directive to the failed child only.
///
/// A child may be restarted at most `max_restarts` times within
/// `within_time`; a restart beyond that budget is turned into a stop.
pub struct OneForOneStrategy {
    max_restarts: u32,
    within_time: Duration,
    decider: Decider,
    failures: Mutex<HashMap<ActorId, FailureWindow>>,
}

impl OneForOneStrategy {
    /// Strategy with the [`default_decider`].
    pub fn new(max_restarts: u32, within_time: Duration) -> Self {
        Self {
            max_restarts,
            within_time,
            decider: default_decider(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the decider.
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }

    /// Restart budget per window.
    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// Length of the counting window.
    pub fn within_time(&self) -> Duration {
        self.within_time
    }

    /// Failures of `child` still inside the window.
    pub fn failure_count(&self, child: &ActorRef) -> usize {
        self.failures
            .lock()
            .get_mut(&child.id())
            .map_or(0, |window| window.count(Instant::now()))
    }
}

impl Default for OneForOneStrategy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl SupervisorStrategy for OneForOneStrategy {
    fn handle_failure(&self, failure: ChildFailure) -> Directive {
        let child = failure.child();
        let recent = self
            .failures
            .lock()
            .entry(child.id())
            .or_insert_with(|| FailureWindow::new(self.within_time))
            .record(Instant::now());

        let directive = (self.decider)(failure.cause());
        if directive == Directive::Restart && recent > self.max_restarts as usize {
            log_event!(LogLevel::Warning, "restart budget exceeded, stopping child",
                strategy => self.name(),
                child => child,
                failures => recent,
                max_restarts => self.max_restarts,
                within_ms => self.within_time.as_millis(),
            );
            self.reset(child);
            return Directive::Stop;
        }

        debug!(
            "Child {} failed ({}): {} [{} in window]",
            child,
            failure.cause().kind(),
            directive,
            recent
        );
        // A stopped child never reports again
        if directive == Directive::Stop {
            self.reset(child);
        }
        directive
    }

    fn reset(&self, child: &ActorRef) {
        self.failures.lock().remove(&child.id());
    }

    fn name(&self) -> &'static str {
        "one_for_one"
    }
}

impl fmt::Debug for OneForOneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneForOneStrategy")
            .field("max_restarts", &self.max_restarts)
            .field("within_time", &self.within_time)
            .field("tracked_children", &self.failures.lock().len())
            .finish()
    }
}
