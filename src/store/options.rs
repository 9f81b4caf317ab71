use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::Store;
use crate::scheduler::{Scheduler, ThreadScheduler};

/// Grace period used when none is configured.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Construction options for a [`Store`].
///
/// # Examples
///
/// ```
/// use larder::{create_store, ManualScheduler, StoreOptions};
/// use std::time::Duration;
///
/// let clock = ManualScheduler::new();
/// let store = create_store(
///     StoreOptions::default()
///         .with_cleanup_timeout(Duration::from_millis(100))
///         .with_scheduler(clock.clone()),
/// );
/// assert_eq!(store.cleanup_timeout(), Duration::from_millis(100));
/// ```
#[derive(Clone)]
pub struct StoreOptions {
    pub(crate) cleanup_timeout: Duration,
    pub(crate) scheduler: Option<Arc<dyn Scheduler>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
            scheduler: None,
        }
    }
}

impl StoreOptions {
    /// Delay between a key losing its last subscriber and its eviction.
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    /// Scheduler that runs the eviction timers. Defaults to
    /// [`ThreadScheduler::shared`].
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn cleanup_timeout(&self) -> Duration {
        self.cleanup_timeout
    }

    pub(crate) fn resolve_scheduler(&self) -> Arc<dyn Scheduler> {
        match &self.scheduler {
            Some(scheduler) => Arc::clone(scheduler),
            None => ThreadScheduler::shared(),
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("cleanup_timeout", &self.cleanup_timeout)
            .field("custom_scheduler", &self.scheduler.is_some())
            .finish()
    }
}

/// Create a new store with the given options.
pub fn create_store(options: StoreOptions) -> Store {
    Store::with_options(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualScheduler;

    #[test]
    fn default_grace_period_is_two_seconds() {
        let options = StoreOptions::default();

        assert_eq!(options.cleanup_timeout(), Duration::from_millis(2000));
        assert!(options.scheduler.is_none());
    }

    #[test]
    fn builder_overrides_timeout_and_scheduler() {
        let clock = ManualScheduler::new();
        let options = StoreOptions::default()
            .with_cleanup_timeout(Duration::from_millis(5))
            .with_scheduler(clock);

        assert_eq!(options.cleanup_timeout(), Duration::from_millis(5));
        assert!(format!("{options:?}").contains("custom_scheduler: true"));
    }
}
