// logging.rs - embedded-friendly leveled logging
// Shotbase is a library that ends up inside GUI tools and DCC plugins, so it
// carries its own tiny logger instead of forcing a global logger crate on
// host applications.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Once;

/// Log levels, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Parses a level name as used by the `SHOTBASE_LOG` environment variable.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> LogLevel {
        match raw {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

// Default: warnings and errors only.
static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static ENV_INIT: Once = Once::new();

/// Sets the process-wide log level.
pub fn set_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current process-wide log level.
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(GLOBAL_LOG_LEVEL.load(Ordering::Relaxed))
}

/// Applies `SHOTBASE_LOG` once per process; later calls are no-ops.
/// Unrecognized values leave the default untouched.
pub fn init_from_env() {
    ENV_INIT.call_once(|| {
        if let Ok(raw) = std::env::var("SHOTBASE_LOG") {
            if let Some(level) = LogLevel::parse(&raw) {
                set_log_level(level);
            }
        }
    });
}

/// True when a record at `level` should be emitted.
#[inline]
pub fn should_log(level: LogLevel) -> bool {
    level as u8 <= GLOBAL_LOG_LEVEL.load(Ordering::Relaxed)
}

/// Writes one record to stderr. Called through the `log_*` macros, which
/// check `should_log` first so disabled levels cost one atomic load.
pub fn log_message(level: LogLevel, module: &str, message: &str) {
    eprintln!("[shotbase {:5}] {}: {}", level.as_str(), module, message);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if $crate::logging::should_log($crate::logging::LogLevel::Error) {
            $crate::logging::log_message($crate::logging::LogLevel::Error, module_path!(), &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::logging::should_log($crate::logging::LogLevel::Warn) {
            $crate::logging::log_message($crate::logging::LogLevel::Warn, module_path!(), &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::logging::should_log($crate::logging::LogLevel::Info) {
            $crate::logging::log_message($crate::logging::LogLevel::Info, module_path!(), &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logging::should_log($crate::logging::LogLevel::Debug) {
            $crate::logging::log_message($crate::logging::LogLevel::Debug, module_path!(), &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if $crate::logging::should_log($crate::logging::LogLevel::Trace) {
            $crate::logging::log_message($crate::logging::LogLevel::Trace, module_path!(), &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_should_log_respects_threshold() {
        let before = log_level();
        set_log_level(LogLevel::Info);
        assert!(should_log(LogLevel::Error));
        assert!(should_log(LogLevel::Info));
        assert!(!should_log(LogLevel::Trace));
        set_log_level(before);
    }
}
