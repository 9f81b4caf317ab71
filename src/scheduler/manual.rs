use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::{Scheduler, Task, TimerHandle};

struct ManualState {
    now: Duration,
    next_id: u64,
    // Ordered by deadline, then by scheduling order.
    queue: BTreeMap<(Duration, u64), Task>,
    // Deadlines past `Duration::MAX`; held until canceled, never run.
    unreachable: HashMap<u64, Task>,
}

/// A scheduler driven by a virtual clock.
///
/// Nothing runs until the clock is moved with [`advance`](Self::advance) or
/// [`run_pending`](Self::run_pending). Tasks execute on the calling thread,
/// outside the scheduler's lock, so a task may schedule or cancel others.
///
/// # Examples
///
/// ```
/// use larder::{ManualScheduler, Scheduler};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// clock.schedule(
///     Duration::from_millis(10),
///     Box::new(move || flag.store(true, Ordering::SeqCst)),
/// );
///
/// clock.advance(Duration::from_millis(9));
/// assert!(!fired.load(Ordering::SeqCst));
/// clock.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                next_id: 0,
                queue: BTreeMap::new(),
                unreachable: HashMap::new(),
            }),
        })
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.queue.len() + state.unreachable.len()
    }

    /// Move the clock forward by `by`, running every task whose deadline is
    /// reached along the way, earliest first.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now.saturating_add(by);

        while let Some(task) = self.pop_due(target) {
            task();
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
    }

    /// Run the tasks queued right now, jumping the clock to each deadline.
    /// Tasks scheduled while these run are left queued.
    pub fn run_pending(&self) {
        let due: Vec<(Duration, u64)> = self.state.lock().queue.keys().copied().collect();

        for entry in due {
            let task = {
                let mut state = self.state.lock();
                let task = state.queue.remove(&entry);
                if task.is_some() && state.now < entry.0 {
                    state.now = entry.0;
                }
                task
            };
            if let Some(task) = task {
                task();
            }
        }
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut state = self.state.lock();
        let (&(deadline, id), _) = state.queue.first_key_value()?;
        if deadline > target {
            return None;
        }
        if state.now < deadline {
            state.now = deadline;
        }
        state.queue.remove(&(deadline, id))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        match state.now.checked_add(delay) {
            Some(deadline) => state.queue.insert((deadline, id), task),
            None => state.unreachable.insert(id, task),
        };
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock();
        state.queue.retain(|&(_, id), _| id != handle.0);
        state.unreachable.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_tasks = log.clone();
        let make = move |name: &'static str| -> Task {
            let log = log_for_tasks.clone();
            Box::new(move || log.lock().push(name))
        };
        (log, make)
    }

    #[test]
    fn runs_tasks_in_deadline_order() {
        let clock = ManualScheduler::new();
        let (log, task) = recorder();

        clock.schedule(Duration::from_millis(30), task("late"));
        clock.schedule(Duration::from_millis(10), task("early"));
        clock.schedule(Duration::from_millis(10), task("early-2"));

        clock.advance(Duration::from_millis(30));

        assert_eq!(*log.lock(), vec!["early", "early-2", "late"]);
        assert_eq!(clock.now(), Duration::from_millis(30));
    }

    #[test]
    fn canceled_task_never_runs() {
        let clock = ManualScheduler::new();
        let (log, task) = recorder();

        let handle = clock.schedule(Duration::from_millis(5), task("canceled"));
        clock.cancel(handle);
        clock.advance(Duration::from_secs(1));

        assert!(log.lock().is_empty());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn deadline_beyond_the_clock_range_never_runs() {
        let clock = ManualScheduler::new();
        let (log, task) = recorder();

        clock.advance(Duration::from_millis(1));
        let handle = clock.schedule(Duration::MAX, task("never"));
        clock.advance(Duration::MAX);

        assert!(log.lock().is_empty());
        assert_eq!(clock.now(), Duration::MAX);
        assert_eq!(clock.pending(), 1);

        clock.cancel(handle);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn task_may_schedule_follow_up_within_same_advance() {
        let clock = ManualScheduler::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let inner_clock = clock.clone();
        let inner_fired = fired.clone();
        clock.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_fired.lock().push(inner_clock.now());
                let again = inner_fired.clone();
                let clock_again = inner_clock.clone();
                inner_clock.schedule(
                    Duration::from_millis(10),
                    Box::new(move || again.lock().push(clock_again.now())),
                );
            }),
        );

        clock.advance(Duration::from_millis(25));

        assert_eq!(
            *fired.lock(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn run_pending_leaves_newly_scheduled_tasks() {
        let clock = ManualScheduler::new();
        let (log, task) = recorder();

        let follow_up = task("follow-up");
        let inner_clock = clock.clone();
        let first = task("first");
        clock.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                first();
                inner_clock.schedule(Duration::from_millis(100), follow_up);
            }),
        );

        clock.run_pending();

        assert_eq!(*log.lock(), vec!["first"]);
        assert_eq!(clock.now(), Duration::from_millis(100));
        assert_eq!(clock.pending(), 1);
    }
}
