//! Actor supervision and failure recovery.
//!
//! A parent actor owns a [`SupervisorStrategy`] and hands it a
//! [`ChildFailure`] whenever one of its children fails. The strategy answers
//! with a [`Directive`]; it never throws and never owns the child, only the
//! failure history recorded under the child's id.
//!
//! Strategies:
//!
//! - [`OneForOneStrategy`]: per-child restart budget within a time window
//! - [`AllForOneStrategy`]: same budget shared by the whole sibling group
//! - [`ExponentialBackoffStrategy`]: restart after a growing, jittered delay
//! - [`RestartWithLimitStrategy`]: per-child restart rate limit per minute

pub mod all_for_one;
pub mod backoff;
pub mod one_for_one;
pub mod restart_limit;
pub mod window;

pub use all_for_one::AllForOneStrategy;
pub use backoff::ExponentialBackoffStrategy;
pub use one_for_one::OneForOneStrategy;
pub use restart_limit::RestartWithLimitStrategy;
pub use window::FailureWindow;

use crate::actor::ActorRef;
use lion_core::error::{ActorError, ConfigError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A supervisor's decision about a failed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    /// Keep the child and its state, continue with the next message
    Resume,
    /// Replace the child with a fresh instance
    Restart,
    /// Stop the child permanently
    Stop,
    /// Fail the supervisor itself, handing the decision to its parent
    Escalate,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resume => "resume",
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::Escalate => "escalate",
        };
        f.write_str(name)
    }
}

/// Failure report sent from a child to its supervisor.
pub struct ChildFailure {
    child: ActorRef,
    cause: ActorError,
    message: Option<Box<dyn Any + Send>>,
    failure_count: u32,
}

impl ChildFailure {
    /// Report the first failure of `child`.
    pub fn new(child: ActorRef, cause: ActorError) -> Self {
        Self {
            child,
            cause,
            message: None,
            failure_count: 1,
        }
    }

    /// Attach the message the child was processing when it failed.
    pub fn with_message<T: Any + Send>(mut self, message: T) -> Self {
        self.message = Some(Box::new(message));
        self
    }

    /// Set how many times the child has failed so far (at least 1).
    pub fn with_failure_count(mut self, failure_count: u32) -> Self {
        self.failure_count = failure_count.max(1);
        self
    }

    /// The failed child.
    pub fn child(&self) -> &ActorRef {
        &self.child
    }

    /// Why the child failed.
    pub fn cause(&self) -> &ActorError {
        &self.cause
    }

    /// The message being processed at failure time, if recorded.
    pub fn message(&self) -> Option<&(dyn Any + Send)> {
        self.message.as_deref()
    }

    /// Number of failures reported for this child, at least 1.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Take back the failing message, e.g. to forward it to dead letters.
    pub fn into_message(self) -> Option<Box<dyn Any + Send>> {
        self.message
    }
}

impl fmt::Debug for ChildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildFailure")
            .field("child", &self.child)
            .field("cause", &self.cause)
            .field("has_message", &self.message.is_some())
            .field("failure_count", &self.failure_count)
            .finish()
    }
}

/// Maps a failure cause to a directive.
pub type Decider = Arc<dyn Fn(&ActorError) -> Directive + Send + Sync>;

/// Wrap a closure as a [`Decider`].
pub fn decider<F>(f: F) -> Decider
where
    F: Fn(&ActorError) -> Directive + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Default decision table.
///
/// Bad input (invalid arguments, type mismatches, missing fields) leaves the
/// actor's state intact, so it resumes. A runtime failure restarts it.
/// Anything else escalates.
pub fn default_decider() -> Decider {
    decider(|cause| match cause {
        ActorError::InvalidArgument(_)
        | ActorError::TypeMismatch(_)
        | ActorError::MissingField(_) => Directive::Resume,
        ActorError::Runtime(_) => Directive::Restart,
        _ => Directive::Escalate,
    })
}

/// Decider that restarts on every failure.
pub fn always_restart() -> Decider {
    decider(|_| Directive::Restart)
}

/// Interface for supervision strategies.
pub trait SupervisorStrategy: Send + Sync {
    /// Decide what happens to the child named in `failure`.
    fn handle_failure(&self, failure: ChildFailure) -> Directive;

    /// Forget the failure history of `child`, called once it processed a
    /// message successfully after a failure.
    fn reset(&self, child: &ActorRef);

    /// Whether the returned directive applies to every child of the
    /// supervisor rather than only the failed one.
    fn applies_to_all_children(&self) -> bool {
        false
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Which strategy a [`SupervisorConfig`] builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`OneForOneStrategy`]
    #[default]
    OneForOne,
    /// [`AllForOneStrategy`]
    AllForOne,
    /// [`ExponentialBackoffStrategy`]
    ExponentialBackoff,
    /// [`RestartWithLimitStrategy`]
    RestartWithLimit,
}

/// Configuration for a supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Strategy to use when a child fails
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Maximum number of restarts (within `within_time_ms` for the windowed
    /// strategies, in total for exponential backoff)
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Time window for counting restarts (milliseconds)
    #[serde(default = "default_within_time_ms")]
    pub within_time_ms: u64,

    /// First backoff delay (milliseconds)
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    /// Largest backoff delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Fraction of the backoff added as random jitter
    #[serde(default = "default_random_factor")]
    pub random_factor: f64,

    /// Restart rate limit for the rate-limited strategy
    #[serde(default = "default_max_restarts_per_minute")]
    pub max_restarts_per_minute: u32,
}

fn default_max_restarts() -> u32 {
    10
}

fn default_within_time_ms() -> u64 {
    60_000
}

fn default_min_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_random_factor() -> f64 {
    0.2
}

fn default_max_restarts_per_minute() -> u32 {
    10
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_restarts: default_max_restarts(),
            within_time_ms: default_within_time_ms(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            random_factor: default_random_factor(),
            max_restarts_per_minute: default_max_restarts_per_minute(),
        }
    }
}

impl SupervisorConfig {
    /// Restart counting window.
    pub fn within_time(&self) -> Duration {
        Duration::from_millis(self.within_time_ms)
    }

    /// Check the values used by the selected strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy {
            StrategyKind::OneForOne | StrategyKind::AllForOne if self.within_time_ms == 0 => Err(
                ConfigError::Invalid("within_time_ms cannot be zero".to_string()),
            ),
            StrategyKind::ExponentialBackoff if self.min_backoff_ms > self.max_backoff_ms => {
                Err(ConfigError::Invalid(format!(
                    "min_backoff_ms ({}) exceeds max_backoff_ms ({})",
                    self.min_backoff_ms, self.max_backoff_ms
                )))
            }
            StrategyKind::ExponentialBackoff
                if !self.random_factor.is_finite() || self.random_factor < 0.0 =>
            {
                Err(ConfigError::Invalid(format!(
                    "random_factor must be a non-negative number, got {}",
                    self.random_factor
                )))
            }
            StrategyKind::RestartWithLimit if self.max_restarts_per_minute == 0 => Err(
                ConfigError::Invalid("max_restarts_per_minute cannot be zero".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Create the configured strategy with its default decider.
    pub fn build(&self) -> Arc<dyn SupervisorStrategy> {
        match self.strategy {
            StrategyKind::OneForOne => Arc::new(OneForOneStrategy::new(
                self.max_restarts,
                self.within_time(),
            )),
            StrategyKind::AllForOne => Arc::new(AllForOneStrategy::new(
                self.max_restarts,
                self.within_time(),
            )),
            StrategyKind::ExponentialBackoff => Arc::new(
                ExponentialBackoffStrategy::new(
                    Duration::from_millis(self.min_backoff_ms),
                    Duration::from_millis(self.max_backoff_ms),
                    self.random_factor,
                )
                .with_max_restarts(self.max_restarts),
            ),
            StrategyKind::RestartWithLimit => {
                Arc::new(RestartWithLimitStrategy::new(self.max_restarts_per_minute))
            }
        }
    }
}
