use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use super::{Scheduler, Task, TimerHandle};
use crate::diagnostics;

struct TimerState {
    next_id: u64,
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: HashMap<u64, Task>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// A wall-clock scheduler backed by a single timer thread.
///
/// Canceled tasks are dropped immediately; their heap entries are skipped
/// when they come due. Dropping the scheduler stops the thread without
/// running the tasks that are still queued.
pub struct ThreadScheduler {
    shared: Arc<Shared>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                next_id: 0,
                deadlines: BinaryHeap::new(),
                tasks: HashMap::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::spawn(move || run(&worker));

        Self { shared }
    }

    /// The process-wide scheduler used by stores that were not given one.
    pub fn shared() -> Arc<Self> {
        static SCHEDULER: OnceLock<Arc<ThreadScheduler>> = OnceLock::new();
        Arc::clone(SCHEDULER.get_or_init(|| Arc::new(Self::new())))
    }

    /// Number of tasks that have been scheduled and neither run nor been
    /// canceled.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        state.tasks.clear();
        drop(state);
        self.shared.wakeup.notify_all();
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let mut state = self.shared.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        // A deadline past what `Instant` can hold is never reached; the task
        // stays queued without one until it is canceled.
        if let Some(deadline) = Instant::now().checked_add(delay) {
            state.deadlines.push(Reverse((deadline, id)));
        }
        state.tasks.insert(id, task);
        drop(state);

        self.shared.wakeup.notify_one();
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.shared.state.lock().tasks.remove(&handle.0);
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }

        let Some(&Reverse((deadline, id))) = state.deadlines.peek() else {
            shared.wakeup.wait(&mut state);
            continue;
        };

        if !state.tasks.contains_key(&id) {
            state.deadlines.pop();
            continue;
        }

        if Instant::now() < deadline {
            shared.wakeup.wait_until(&mut state, deadline);
            continue;
        }

        state.deadlines.pop();
        if let Some(task) = state.tasks.remove(&id) {
            MutexGuard::unlocked(&mut state, || {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    diagnostics::warn(format_args!("timer task {id} panicked"));
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn runs_task_after_delay() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();

        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || tx.send(Instant::now()).unwrap()),
        );

        let fired_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired_at.duration_since(started) >= Duration::from_millis(20));
    }

    #[test]
    fn earlier_deadline_scheduled_later_runs_first() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel();

        let slow = tx.clone();
        scheduler.schedule(
            Duration::from_millis(200),
            Box::new(move || slow.send("slow").unwrap()),
        );
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || tx.send("fast").unwrap()),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "fast");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "slow");
    }

    #[test]
    fn canceled_task_is_dropped() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel::<()>();

        let handle = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || tx.send(()).unwrap()),
        );
        scheduler.cancel(handle);

        assert_eq!(scheduler.pending(), 0);
        // The sender was dropped along with the task.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn unreachable_deadline_is_held_until_canceled() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel::<()>();

        let handle = scheduler.schedule(Duration::MAX, Box::new(move || tx.send(()).unwrap()));
        assert_eq!(scheduler.pending(), 1);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        scheduler.cancel(handle);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn panicking_task_does_not_stop_the_timer_thread() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(Duration::ZERO, Box::new(|| panic!("timer task failure")));
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || tx.send(42).unwrap()),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }
}
