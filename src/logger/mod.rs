//! Structured, tag-based logging for chainpulse
//!
//! ## Usage
//!
//! ```rust
//! use chainpulse::logger::{self, LogTag};
//!
//! logger::error(LogTag::Rpc, "All endpoints failed");
//! logger::warning(LogTag::Health, "Endpoint helius marked unhealthy");
//! logger::info(LogTag::System, "Upstream service started");
//! logger::debug(LogTag::Cache, "Miss price/sol-usd"); // Only with --debug-cache
//! ```
//!
//! Call [`init`] once at startup so that `--debug`, `--debug-<tag>` and
//! `--quiet` flags take effect.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{
    get_logger_config, init_from_args, set_logger_config, update_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line flags
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless a stricter level is configured)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when `--debug` or `--debug-<tag>` was passed for this tag.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}
