#![deny(missing_docs)]
//! Shared logging utilities for the folio workspace.
//!
//! This crate provides the `folio_*` logging macros used across the codebase,
//! a per-thread query sequence tag that prefixes every line, and a minimal
//! test initializer for the global logger.

use std::cell::Cell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Sequence number of the answer query the current thread is working on.
    static QUERY_SEQ: Cell<u64> = const { Cell::new(0) };
}

/// Tags subsequent log lines on this thread with the given query sequence.
/// Zero means "no query".
pub fn set_query_seq(seq: u64) {
    QUERY_SEQ.with(|v| v.set(seq));
}

/// Returns the query sequence tag for the current thread, 0 if unset.
pub fn query_seq() -> u64 {
    QUERY_SEQ.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current query sequence.
#[macro_export]
macro_rules! folio_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("[q{}] {}", $crate::query_seq(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current query sequence.
#[macro_export]
macro_rules! folio_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("[q{}] {}", $crate::query_seq(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current query sequence.
#[macro_export]
macro_rules! folio_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("[q{}] {}", $crate::query_seq(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current query sequence.
#[macro_export]
macro_rules! folio_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("[q{}] {}", $crate::query_seq(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current query sequence.
#[macro_export]
macro_rules! folio_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("[q{}] {}", $crate::query_seq(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may already own the global logger.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
