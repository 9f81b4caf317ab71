//! Deferred execution used for grace-period cleanup.
//!
//! The store never sleeps or reads the wall clock itself. It hands cleanup
//! tasks to a [`Scheduler`], which makes eviction timing injectable:
//! [`ThreadScheduler`] runs tasks on a background timer thread, while
//! [`ManualScheduler`] keeps a virtual clock that tests advance explicitly.

mod manual;
mod thread;

use std::time::Duration;

pub use manual::ManualScheduler;
pub use thread::ThreadScheduler;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled task so it can be canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

/// Runs tasks after a delay.
///
/// Implementations must never run `task` from inside `schedule` itself: the
/// store calls `schedule` and `cancel` while holding its own lock.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Prevent a not-yet-started task from running. Canceling a task that
    /// already ran, or is running, has no effect.
    fn cancel(&self, handle: TimerHandle);
}
