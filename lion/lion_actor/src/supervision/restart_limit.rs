//! Restart rate limiting.

use super::{always_restart, ChildFailure, Decider, Directive, FailureWindow, SupervisorStrategy};
use crate::actor::ActorRef;
use lion_core::id::ActorId;
use lion_core::log_event;
use lion_core::utils::LogLevel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Window over which [`RestartWithLimitStrategy`] counts restarts.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Stops a child that has been restarted `max_restarts_per_minute` times in
/// the last minute; otherwise defers to the decider.
///
/// Only granted restarts count against the limit.
pub struct RestartWithLimitStrategy {
    max_restarts_per_minute: u32,
    decider: Decider,
    restarts: Mutex<HashMap<ActorId, FailureWindow>>,
}

impl RestartWithLimitStrategy {
    /// Strategy that restarts on every failure until the limit is hit.
    pub fn new(max_restarts_per_minute: u32) -> Self {
        Self {
            max_restarts_per_minute,
            decider: always_restart(),
            restarts: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the decider consulted while under the limit.
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }

    /// Restarts of `child` inside the rate window.
    pub fn restart_count(&self, child: &ActorRef) -> usize {
        self.restarts
            .lock()
            .get_mut(&child.id())
            .map_or(0, |window| window.count(Instant::now()))
    }
}

impl SupervisorStrategy for RestartWithLimitStrategy {
    fn handle_failure(&self, failure: ChildFailure) -> Directive {
        let child = failure.child();
        let now = Instant::now();
        let mut restarts = self.restarts.lock();
        let window = restarts
            .entry(child.id())
            .or_insert_with(|| FailureWindow::new(RATE_LIMIT_WINDOW));

        let recent = window.count(now);
        if recent >= self.max_restarts_per_minute as usize {
            log_event!(LogLevel::Warning, "restart rate limited, stopping child",
                strategy => self.name(),
                child => child,
                restarts => recent,
                max_restarts_per_minute => self.max_restarts_per_minute,
            );
            restarts.remove(&child.id());
            return Directive::Stop;
        }

        let directive = (self.decider)(failure.cause());
        match directive {
            Directive::Restart => {
                window.record(now);
            }
            Directive::Stop => {
                restarts.remove(&child.id());
            }
            Directive::Resume | Directive::Escalate => {}
        }
        directive
    }

    fn reset(&self, child: &ActorRef) {
        self.restarts.lock().remove(&child.id());
    }

    fn name(&self) -> &'static str {
        "restart_with_limit"
    }
}

impl fmt::Debug for RestartWithLimitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartWithLimitStrategy")
            .field("max_restarts_per_minute", &self.max_restarts_per_minute)
            .field("tracked_children", &self.restarts.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervision::default_decider;
    use lion_core::error::ActorError;

    fn fail(child: &ActorRef, cause: ActorError) -> ChildFailure {
        ChildFailure::new(child.clone(), cause)
    }

    #[test]
    fn test_rate_limit() {
        let strategy = RestartWithLimitStrategy::new(3);
        let child = ActorRef::new("worker");

        for _ in 0..3 {
            let failure = fail(&child, ActorError::Panicked("boom".into()));
            assert_eq!(strategy.handle_failure(failure), Directive::Restart);
        }
        assert_eq!(strategy.restart_count(&child), 3);
        let failure = fail(&child, ActorError::Panicked("boom".into()));
        assert_eq!(strategy.handle_failure(failure), Directive::Stop);
        assert_eq!(strategy.restart_count(&child), 0);
    }

    #[test]
    fn test_decider_stop_drops_history() {
        let strategy = RestartWithLimitStrategy::new(5).with_decider(crate::supervision::decider(
            |cause| match cause {
                ActorError::Fatal(_) => Directive::Stop,
                _ => Directive::Restart,
            },
        ));
        let child = ActorRef::new("worker");

        strategy.handle_failure(fail(&child, ActorError::Runtime("x".into())));
        assert_eq!(strategy.restart_count(&child), 1);
        assert_eq!(
            strategy.handle_failure(fail(&child, ActorError::Fatal("x".into()))),
            Directive::Stop
        );
        assert_eq!(strategy.restart_count(&child), 0);
        assert!(format!("{strategy:?}").contains("tracked_children: 0"));
    }

    #[test]
    fn test_limit_checked_before_decider() {
        let strategy = RestartWithLimitStrategy::new(1).with_decider(default_decider());
        let child = ActorRef::new("worker");

        assert_eq!(
            strategy.handle_failure(fail(&child, ActorError::Runtime("x".into()))),
            Directive::Restart
        );
        // Would resume under the decider, but the limit wins
        assert_eq!(
            strategy.handle_failure(fail(&child, ActorError::InvalidArgument("x".into()))),
            Directive::Stop
        );
    }

    #[test]
    fn test_non_restart_directives_are_not_counted() {
        let strategy = RestartWithLimitStrategy::new(1).with_decider(default_decider());
        let child = ActorRef::new("worker");

        for _ in 0..5 {
            assert_eq!(
                strategy.handle_failure(fail(&child, ActorError::MissingField("id".into()))),
                Directive::Resume
            );
        }
        assert_eq!(strategy.restart_count(&child), 0);
    }

    #[test]
    fn test_reset() {
        let strategy = RestartWithLimitStrategy::new(1);
        let child = ActorRef::new("worker");
        let other = ActorRef::new("other");

        strategy.handle_failure(fail(&child, ActorError::Runtime("x".into())));
        assert_eq!(
            strategy.handle_failure(fail(&other, ActorError::Runtime("x".into()))),
            Directive::Restart
        );

        strategy.reset(&child);
        assert_eq!(
            strategy.handle_failure(fail(&child, ActorError::Runtime("x".into()))),
            Directive::Restart
        );
    }
}
