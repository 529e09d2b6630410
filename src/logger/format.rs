//! Log formatting and console output
//!
//! Line layout: `HH:MM:SS [TAG     ] [LEVEL  ] message`

use super::config::get_logger_config;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 8;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let colors = get_logger_config().colors;

    let line = if colors {
        format!(
            "{} [{}] [{}] {}",
            time.dimmed(),
            format_tag(tag),
            format_level(level),
            message
        )
    } else {
        format!(
            "{} [{:<tw$}] [{:<lw$}] {}",
            time,
            tag.to_plain_string(),
            level.as_str(),
            message,
            tw = TAG_WIDTH,
            lw = LEVEL_WIDTH
        )
    };

    match level {
        LogLevel::Error | LogLevel::Warning => print_safe(&mut stderr(), &line),
        _ => print_safe(&mut stdout(), &line),
    }
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Rpc => label.bright_cyan().bold(),
        LogTag::Health => label.bright_green().bold(),
        LogTag::Cache => label.bright_magenta().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

/// Format log level with appropriate color
fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug => label.dimmed(),
    }
}

/// Write a line but exit quietly on broken pipe (e.g. `chainpulse status | head`)
fn print_safe<W: Write>(out: &mut W, message: &str) {
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
