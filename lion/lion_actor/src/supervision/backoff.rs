//! Exponential backoff supervision.

use super::{ChildFailure, Directive, SupervisorStrategy};
use crate::actor::ActorRef;
use lion_core::id::ActorId;
use lion_core::log_event;
use lion_core::utils::LogLevel;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::thread;
use std::time::Duration;

/// Restarts a failed child after a delay that doubles with every restart,
/// capped at `max_backoff` and widened by random jitter.
///
/// `handle_failure` sleeps on the calling thread for the computed delay
/// before answering [`Directive::Restart`]. Once a child has used up
/// `max_restarts` restarts it is stopped instead.
pub struct ExponentialBackoffStrategy {
    min_backoff: Duration,
    max_backoff: Duration,
    random_factor: f64,
    max_restarts: u32,
    restart_counts: Mutex<HashMap<ActorId, u32>>,
}

impl ExponentialBackoffStrategy {
    /// Strategy allowing 10 restarts per child.
    ///
    /// A negative or non-finite `random_factor` disables jitter.
    pub fn new(min_backoff: Duration, max_backoff: Duration, random_factor: f64) -> Self {
        let random_factor = if random_factor.is_finite() {
            random_factor.max(0.0)
        } else {
            0.0
        };
        Self {
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
            random_factor,
            max_restarts: 10,
            restart_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Change how many restarts a child gets before it is stopped.
    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Delay before the restart that follows `restart_count` earlier
    /// restarts, without jitter: `min(min_backoff * 2^restart_count, max_backoff)`.
    pub fn backoff_for(&self, restart_count: u32) -> Duration {
        let factor = 2u32.checked_pow(restart_count).unwrap_or(u32::MAX);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Restarts granted to `child` since it was last reset.
    pub fn restart_count(&self, child: &ActorRef) -> u32 {
        self.restart_counts
            .lock()
            .get(&child.id())
            .copied()
            .unwrap_or(0)
    }

    fn jitter(&self, backoff: Duration) -> Duration {
        if self.random_factor == 0.0 {
            return Duration::ZERO;
        }
        let sample: f64 = rand::thread_rng().gen();
        Duration::try_from_secs_f64(backoff.as_secs_f64() * self.random_factor * sample)
            .unwrap_or(Duration::ZERO)
    }
}

impl SupervisorStrategy for ExponentialBackoffStrategy {
    fn handle_failure(&self, failure: ChildFailure) -> Directive {
        let child = failure.child();

        let previous = {
            let mut counts = self.restart_counts.lock();
            let count = counts.entry(child.id()).or_insert(0);
            if *count >= self.max_restarts {
                counts.remove(&child.id());
                None
            } else {
                *count += 1;
                Some(*count - 1)
            }
        };

        let Some(previous) = previous else {
            log_event!(LogLevel::Warning, "backoff restarts exhausted, stopping child",
                strategy => self.name(),
                child => child,
                max_restarts => self.max_restarts,
            );
            return Directive::Stop;
        };

        let backoff = self.backoff_for(previous);
        let delay = backoff + self.jitter(backoff);
        log_event!(LogLevel::Info, "restarting child after backoff",
            child => child,
            attempt => previous + 1,
            cause => failure.cause().kind(),
            delay_ms => delay.as_millis(),
        );

        // Blocks the supervising thread; the directive is only returned
        // once the backoff has elapsed.
        thread::sleep(delay);
        Directive::Restart
    }

    fn reset(&self, child: &ActorRef) {
        self.restart_counts.lock().remove(&child.id());
    }

    fn name(&self) -> &'static str {
        "exponential_backoff"
    }
}

impl fmt::Debug for ExponentialBackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoffStrategy")
            .field("min_backoff", &self.min_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("random_factor", &self.random_factor)
            .field("max_restarts", &self.max_restarts)
            .field("tracked_children", &self.restart_counts.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lion_core::error::ActorError;
    use std::time::Instant;

    fn fail(child: &ActorRef) -> ChildFailure {
        ChildFailure::new(child.clone(), ActorError::Panicked("oops".into()))
    }

    #[test]
    fn test_backoff_curve() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(100), Duration::from_secs(1), 0.0);

        assert_eq!(strategy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(strategy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(strategy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(strategy.backoff_for(3), Duration::from_millis(800));
        // Capped at max_backoff
        assert_eq!(strategy.backoff_for(4), Duration::from_secs(1));
        assert_eq!(strategy.backoff_for(64), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(3), Duration::from_secs(90), 0.5);
        for k in 0..40 {
            assert!(strategy.backoff_for(k + 1) >= strategy.backoff_for(k));
        }
    }

    #[test]
    fn test_restart_blocks_for_backoff() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(20), Duration::from_secs(1), 0.0);
        let child = ActorRef::new("worker");

        let start = Instant::now();
        // Restarts regardless of the cause
        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Restart);
        assert!(start.elapsed() >= Duration::from_millis(20));

        let start = Instant::now();
        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Restart);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(strategy.restart_count(&child), 2);
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(100), Duration::from_secs(1), 0.5);
        for _ in 0..100 {
            let jitter = strategy.jitter(Duration::from_millis(100));
            assert!(jitter <= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_stop_after_max_restarts() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(1), Duration::from_millis(2), 0.0)
                .with_max_restarts(2);
        let child = ActorRef::new("worker");

        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Restart);
        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Restart);
        assert_eq!(strategy.restart_count(&child), 2);
        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Stop);
        // Stopping forgets the child
        assert_eq!(strategy.restart_count(&child), 0);
        assert!(format!("{strategy:?}").contains("tracked_children: 0"));
        assert_eq!(strategy.handle_failure(fail(&child)), Directive::Restart);
    }

    #[test]
    fn test_invalid_random_factor_disables_jitter() {
        let strategy =
            ExponentialBackoffStrategy::new(Duration::from_millis(10), Duration::from_millis(5), f64::NAN);
        assert_eq!(strategy.jitter(Duration::from_millis(10)), Duration::ZERO);
        // max_backoff is raised to min_backoff
        assert_eq!(strategy.backoff_for(3), Duration::from_millis(10));
    }
}
