#![deny(missing_docs)]
//! Shared logging utilities for the harvest workspace.
//!
//! Every crate logs through the `harvest_*` macros below. They forward to the
//! `log` facade, which is re-exported here so that callers do not need their
//! own `log` dependency just to emit a line.

#[doc(hidden)]
pub use log as __log;

/// Environment variable read by [`initialize_for_tests`] to pick a level.
pub const TEST_LOG_ENV: &str = "HARVEST_TEST_LOG";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! harvest_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! harvest_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! harvest_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! harvest_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! harvest_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!($($arg)*);
    }};
}

/// Parses a level name such as `"debug"` or `"WARN"`.
///
/// Returns `None` for anything `log` does not recognise.
pub fn parse_level(name: &str) -> Option<log::LevelFilter> {
    name.trim().parse().ok()
}

/// Initializes a simple terminal logger for use in tests.
///
/// The level comes from `HARVEST_TEST_LOG` when set, otherwise debug in debug
/// builds and info in release builds. Safely no-ops if another logger has
/// already been installed by an earlier test.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

    let fallback = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let level = std::env::var(TEST_LOG_ENV)
        .ok()
        .and_then(|value| parse_level(&value))
        .unwrap_or(fallback);

    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
}
