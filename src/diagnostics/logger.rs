use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A single diagnostic sink. Receives pre-formatted arguments.
pub type LogFn = Arc<dyn Fn(fmt::Arguments<'_>) + Send + Sync>;

/// The four sinks the library writes to.
#[derive(Clone)]
pub struct Logger {
    log: LogFn,
    error: LogFn,
    warn: LogFn,
    debug: LogFn,
}

impl Default for Logger {
    /// `log`, `error` and `warn` go to `tracing`; `debug` is dropped.
    fn default() -> Self {
        Self {
            log: Arc::new(|args: fmt::Arguments<'_>| tracing::info!("{}", args)),
            error: Arc::new(|args: fmt::Arguments<'_>| tracing::error!("{}", args)),
            warn: Arc::new(|args: fmt::Arguments<'_>| tracing::warn!("{}", args)),
            debug: Arc::new(|_: fmt::Arguments<'_>| {}),
        }
    }
}

impl Logger {
    pub fn log(&self, args: fmt::Arguments<'_>) {
        (self.log)(args)
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        (self.error)(args)
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        (self.warn)(args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        (self.debug)(args)
    }

    fn apply(&mut self, overrides: LoggerOverrides) {
        if let Some(log) = overrides.log {
            self.log = log;
        }
        if let Some(error) = overrides.error {
            self.error = error;
        }
        if let Some(warn) = overrides.warn {
            self.warn = warn;
        }
        if let Some(debug) = overrides.debug {
            self.debug = debug;
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// A partial replacement for the active [`Logger`].
///
/// Sinks left unset keep whatever implementation was active before the call
/// to [`set_logger`].
///
/// # Examples
///
/// ```
/// use larder::diagnostics::{set_logger, LoggerOverrides};
///
/// set_logger(LoggerOverrides::new().debug(|args| eprintln!("[larder] {args}")));
/// ```
#[derive(Clone, Default)]
pub struct LoggerOverrides {
    log: Option<LogFn>,
    error: Option<LogFn>,
    warn: Option<LogFn>,
    debug: Option<LogFn>,
}

impl LoggerOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route all four sinks to the same function.
    pub fn all<F>(f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        let f: LogFn = Arc::new(f);
        Self {
            log: Some(f.clone()),
            error: Some(f.clone()),
            warn: Some(f.clone()),
            debug: Some(f),
        }
    }

    pub fn log<F>(mut self, f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(f));
        self
    }

    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn warn<F>(mut self, f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.warn = Some(Arc::new(f));
        self
    }

    pub fn debug<F>(mut self, f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.debug = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LoggerOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOverrides")
            .field("log", &self.log.is_some())
            .field("error", &self.error.is_some())
            .field("warn", &self.warn.is_some())
            .field("debug", &self.debug.is_some())
            .finish()
    }
}

fn active() -> &'static RwLock<Logger> {
    static LOGGER: OnceLock<RwLock<Logger>> = OnceLock::new();
    LOGGER.get_or_init(|| RwLock::new(Logger::default()))
}

/// Replace some or all of the process-wide sinks.
pub fn set_logger(overrides: LoggerOverrides) {
    active().write().apply(overrides);
}

/// Restore the default sinks.
pub fn reset_logger() {
    *active().write() = Logger::default();
}

/// A snapshot of the currently active sinks.
pub fn current_logger() -> Logger {
    active().read().clone()
}

// Each sink is cloned out before it is called so a sink may itself call
// `set_logger` without deadlocking.

pub fn log(args: fmt::Arguments<'_>) {
    let sink = active().read().log.clone();
    sink(args)
}

pub fn error(args: fmt::Arguments<'_>) {
    let sink = active().read().error.clone();
    sink(args)
}

pub fn warn(args: fmt::Arguments<'_>) {
    let sink = active().read().warn.clone();
    sink(args)
}

pub fn debug(args: fmt::Arguments<'_>) {
    let sink = active().read().debug.clone();
    sink(args)
}
