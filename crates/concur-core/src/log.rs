//! Kernel-style leveled diagnostic printing.
//!
//! Verbosity is controlled by `CONCUR_LOG_LEVEL` (0=off..5=trace) and has no
//! effect on scheduling behavior — it exists purely for diagnostics, the way
//! the teacher's `kprint` module does for the scheduler.
//!
//! # Environment variables
//!
//! - `CONCUR_LOG_LEVEL` — off|error|warn|info|debug|trace or 0..5
//! - `CONCUR_LOG_FLUSH` — flush stderr after each line

use crate::env::env_get_bool;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize logging from environment variables. Called automatically on
/// first log, but may be called explicitly for deterministic setup.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    FLUSH_ENABLED.store(env_get_bool("CONCUR_LOG_FLUSH", false), Ordering::Relaxed);
    if let Ok(val) = std::env::var("CONCUR_LOG_LEVEL") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
pub fn flush_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically, overriding the environment.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= log_level() as u8
}

thread_local! {
    static POOL_ID: std::cell::Cell<Option<u32>> = const { std::cell::Cell::new(None) };
    static WORKER_ID: std::cell::Cell<Option<u32>> = const { std::cell::Cell::new(None) };
}

/// Record which pool/worker owns the calling thread, for log context. Called
/// by `ThreadPool`/`ParallelExecutor` when a worker enters its run loop.
pub fn set_context(pool_id: u32, worker_id: u32) {
    POOL_ID.with(|p| p.set(Some(pool_id)));
    WORKER_ID.with(|w| w.set(Some(worker_id)));
}

/// Clear log context, called on worker exit.
pub fn clear_context() {
    POOL_ID.with(|p| p.set(None));
    WORKER_ID.with(|w| w.set(None));
}

fn format_context() -> String {
    let pool = POOL_ID.with(|p| p.get());
    let worker = WORKER_ID.with(|w| w.get());
    match (pool, worker) {
        (Some(p), Some(w)) => format!("[p{}:w{}]", p, w),
        _ => "[p-:w-]".to_string(),
    }
}

#[doc(hidden)]
pub fn _clog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} {} ", level.prefix(), format_context());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

/// Error level log with pool/worker context.
#[macro_export]
macro_rules! cerror {
    ($($arg:tt)*) => {{
        $crate::log::_clog_impl($crate::log::LogLevel::Error, format_args!($($arg)*));
    }};
}

/// Warning level log with pool/worker context.
#[macro_export]
macro_rules! cwarn {
    ($($arg:tt)*) => {{
        $crate::log::_clog_impl($crate::log::LogLevel::Warn, format_args!($($arg)*));
    }};
}

/// Info level log with pool/worker context.
#[macro_export]
macro_rules! cinfo {
    ($($arg:tt)*) => {{
        $crate::log::_clog_impl($crate::log::LogLevel::Info, format_args!($($arg)*));
    }};
}

/// Debug level log with pool/worker context.
#[macro_export]
macro_rules! cdebug {
    ($($arg:tt)*) => {{
        $crate::log::_clog_impl($crate::log::LogLevel::Debug, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_ordered() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_context_roundtrip() {
        set_context(1, 2);
        assert_eq!(format_context(), "[p1:w2]");
        clear_context();
        assert_eq!(format_context(), "[p-:w-]");
    }

    #[test]
    fn test_macros_compile() {
        set_log_level(LogLevel::Off);
        cerror!("err {}", 1);
        cwarn!("warn");
        cinfo!("info");
        cdebug!("debug {:?}", Some(3));
    }
}
