//! Process-wide diagnostic sinks.
//!
//! The store reports its internal lifecycle (subscriptions, notifications,
//! cleanup) at debug level and subscriber failures at error level through a
//! replaceable [`Logger`]. By default everything except debug is forwarded to
//! [`tracing`].

mod logger;

pub use logger::{
    current_logger, debug, error, log, reset_logger, set_logger, warn, LogFn, Logger,
    LoggerOverrides,
};
