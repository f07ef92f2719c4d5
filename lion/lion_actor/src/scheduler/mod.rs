//! Delayed delivery.
//!
//! The FSM actor relies on one-shot timers to deliver state timeouts. This
//! module provides a thread-backed implementation of that scheduling API.

pub mod timer;

pub use timer::{SchedulerError, TimerHandle, TimerScheduler};
