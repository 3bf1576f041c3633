#![deny(missing_docs)]
//! Shared logging utilities for the portfolio workspace.
//!
//! This crate provides the `portfolio_*` logging macros used across the
//! codebase, a helper for keeping OAuth secrets out of log lines, and a
//! minimal test initializer for the global logger.

/// Number of leading characters of a secret that [`redact`] keeps visible.
pub const REDACT_VISIBLE_CHARS: usize = 4;

/// Shortens a token or secret so it can be logged without leaking it.
///
/// Keeps the first [`REDACT_VISIBLE_CHARS`] characters and replaces the rest
/// with `…`. Empty input is shown as `<empty>`.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<empty>".to_string();
    }
    let visible: String = secret.chars().take(REDACT_VISIBLE_CHARS).collect();
    if visible.len() == secret.len() {
        // Too short to partially reveal.
        return "****".to_string();
    }
    format!("{visible}…")
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! portfolio_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! portfolio_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! portfolio_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! portfolio_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! portfolio_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
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

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
