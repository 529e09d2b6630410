/// Logger configuration: minimum level and per-tag debug switches
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are dropped
    pub min_level: LogLevel,
    /// Debug output for every tag (`--debug`)
    pub debug_all: bool,
    /// Tags with debug output enabled (`--debug-<tag>`)
    pub debug_tags: HashSet<String>,
    /// Colored console output
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_all: false,
            debug_tags: HashSet::new(),
            colors: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Get a copy of the current logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

/// Replace the logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Mutate the logger configuration in place
pub fn update_logger_config<F: FnOnce(&mut LoggerConfig)>(f: F) {
    f(&mut LOGGER_CONFIG.write());
}

/// Build the logger configuration from command-line flags
pub fn init_from_args() {
    let debug_all = arguments::is_debug_enabled();
    let debug_tags: HashSet<String> = arguments::debug_tags().into_iter().collect();

    let min_level = if arguments::is_quiet_enabled() {
        LogLevel::Warning
    } else if debug_all || !debug_tags.is_empty() {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    update_logger_config(|cfg| {
        cfg.min_level = min_level;
        cfg.debug_all = debug_all;
        cfg.debug_tags = debug_tags;
    });
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.debug_all || config.debug_tags.contains(&tag.to_debug_key())
}
