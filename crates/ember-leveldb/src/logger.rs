use std::fmt;

use tracing::{debug, error, info, warn};

/// Abstraction over where diagnostic messages go, mirroring the teacher's logger-trait pattern.
/// The production implementation ([`TracingLogger`]) emits through `tracing`, tagged with the
/// component that produced the message; [`NoopLogger`] is available for embedding this crate
/// where no logging infrastructure is wanted.
pub trait InfoLogger: Send + Sync {
    fn log(&self, level: LogLevel, component: &'static str, message: fmt::Arguments<'_>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logs through `tracing`, matching the level and a `component` field (`"compaction"`,
/// `"recovery"`, `"write_log"`, `"version_set"`, ...) to each call site.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl InfoLogger for TracingLogger {
    fn log(&self, level: LogLevel, component: &'static str, message: fmt::Arguments<'_>) {
        match level {
            LogLevel::Debug => debug!(component, "{message}"),
            LogLevel::Info => info!(component, "{message}"),
            LogLevel::Warn => warn!(component, "{message}"),
            LogLevel::Error => error!(component, "{message}"),
        }
    }
}

/// Discards every message. Useful when embedding the database in a context that manages its
/// own logging and doesn't want LevelDB-internal chatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl InfoLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _component: &'static str, _message: fmt::Arguments<'_>) {}
}

macro_rules! log_component {
    ($logger:expr, $level:ident, $component:expr, $($arg:tt)*) => {
        $logger.log($crate::logger::LogLevel::$level, $component, format_args!($($arg)*))
    };
}

pub(crate) use log_component;
