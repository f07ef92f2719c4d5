//! One-shot timer scheduling.
//!
//! A single background thread owns a min-heap of deadlines and is fed new
//! timers over a channel. Timers can be cancelled through their handle at any
//! point; cancelling a timer that already fired or was already cancelled is a
//! no-op.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use lion_core::id::TimerId;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error when scheduling a timer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler has been shut down
    #[error("timer scheduler is shut down")]
    ShutDown,
}

/// Heap size at which cancelled timers are first swept out.
const MIN_COMPACT_LEN: usize = 64;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a scheduled timer, used to cancel it.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: TimerId,
    state: Arc<AtomicU8>,
}

impl TimerHandle {
    pub(crate) fn pending() -> Self {
        Self {
            id: TimerId::new(),
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// A handle for a timer that will never fire.
    pub fn cancelled() -> Self {
        let handle = Self::pending();
        handle.state.store(CANCELLED, Ordering::Release);
        handle
    }

    /// Identifier of the timer.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancel the timer. Returns `true` if this call prevented it from firing.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Whether the timer has fired.
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    /// Whether the timer was cancelled before firing.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn try_fire(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct Timer {
    deadline: Instant,
    seq: u64,
    handle: TimerHandle,
    task: Box<dyn FnOnce() + Send + 'static>,
}

// BinaryHeap is a max-heap; invert so the earliest deadline is on top and
// timers sharing a deadline fire in scheduling order.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

enum Command {
    Schedule(Timer),
    Shutdown,
}

/// Thread-backed scheduler for one-shot delayed tasks.
pub struct TimerScheduler {
    sender: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    is_shut_down: AtomicBool,
    next_seq: AtomicU64,
}

impl TimerScheduler {
    /// Start a scheduler with its own timer thread.
    pub fn new() -> Self {
        Self::with_thread_name("lion-timer")
    }

    /// Start a scheduler whose timer thread carries the given name.
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        let (sender, receiver) = unbounded();
        let name = name.into();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_timer_loop(receiver))
            .map_err(|e| error!("Failed to spawn timer thread {}: {}", name, e))
            .ok();

        Self {
            sender,
            is_shut_down: AtomicBool::new(worker.is_none()),
            worker: Mutex::new(worker),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Run `task` once after `delay`.
    ///
    /// After shutdown the returned handle is already cancelled and the task
    /// is dropped without running.
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_schedule_once(delay, task).unwrap_or_else(|e| {
            warn!("Dropping timer: {}", e);
            TimerHandle::cancelled()
        })
    }

    /// Like [`schedule_once`](Self::schedule_once), but reports a shut down
    /// scheduler as an error.
    pub fn try_schedule_once<F>(&self, delay: Duration, task: F) -> Result<TimerHandle, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shut_down.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutDown);
        }

        let handle = TimerHandle::pending();
        let timer = Timer {
            deadline: Instant::now() + delay,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            handle: handle.clone(),
            task: Box::new(task),
        };

        self.sender
            .send(Command::Schedule(timer))
            .map_err(|_| SchedulerError::ShutDown)?;
        trace!("Scheduled timer {} in {:?}", handle.id().short(), delay);
        Ok(handle)
    }

    /// Cancel a timer. Idempotent.
    pub fn cancel(&self, handle: &TimerHandle) {
        if handle.cancel() {
            trace!("Cancelled timer {}", handle.id().short());
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.is_shut_down.load(Ordering::Acquire)
    }

    /// Stop the timer thread. Timers that have not fired yet are discarded.
    pub fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Timer thread panicked during shutdown");
            }
        }
        debug!("Timer scheduler shut down");
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer_loop(receiver: Receiver<Command>) {
    let mut timers: BinaryHeap<Timer> = BinaryHeap::new();
    // Cancelled timers keep their task (and whatever it captured) until
    // swept. Sweeping whenever the heap doubles keeps the cost amortized.
    let mut compact_at = MIN_COMPACT_LEN;

    loop {
        let command = match timers.peek() {
            Some(next) => {
                let wait = next.deadline.saturating_duration_since(Instant::now());
                receiver.recv_timeout(wait)
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(Command::Schedule(timer)) => {
                timers.push(timer);
                if timers.len() >= compact_at {
                    let before = timers.len();
                    timers.retain(|t| t.handle.is_pending());
                    compact_at = (timers.len() * 2).max(MIN_COMPACT_LEN);
                    trace!("Swept {} cancelled timers", before - timers.len());
                }
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        while timers.peek().is_some_and(|t| t.deadline <= now) {
            let Some(timer) = timers.pop() else { break };
            if !timer.handle.try_fire() {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(timer.task)).is_err() {
                error!("Timer {} task panicked", timer.handle.id().short());
            }
        }
    }

    if !timers.is_empty() {
        debug!("Timer thread exiting with {} pending timers", timers.len());
    }
}
