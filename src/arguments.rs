/// Command-line argument helpers shared by the binary and the logger
///
/// The `chainpulse` binary parses its subcommands with clap, but debug flags
/// (`--debug`, `--debug-<tag>`, `--quiet`) are read from the raw argument list
/// so that the logger can be configured before clap runs.
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Overrides the stored command-line arguments (used by tests)
pub fn set_cmd_args(args: Vec<String>) {
    *CMD_ARGS.lock() = args;
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Tags requested through `--debug-<tag>` flags, lowercased
pub fn debug_tags() -> Vec<String> {
    get_cmd_args()
        .iter()
        .filter_map(|a| a.strip_prefix("--debug-"))
        .map(|tag| tag.to_lowercase())
        .collect()
}

/// Global debug mode (all tags)
pub fn is_debug_enabled() -> bool {
    has_arg("--debug")
}

/// Quiet mode - only warnings and errors are printed
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}
