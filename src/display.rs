//! Colored CLI display of child events.
//!
//! In raw mode events are relayed unchanged: lines and compact JSON to
//! stdout, stderr data to stderr, so the output is itself valid LD-JSON.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::child::{ChildEvent, ExitInfo};

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 200;

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Describe how a child ended.
#[must_use]
pub fn describe_exit(info: &ExitInfo) -> String {
    match (info.code, info.signal) {
        (Some(code), _) => format!("code={code}"),
        (None, Some(signal)) => format!("signal={}", signal.as_str()),
        (None, None) => "status unknown".to_string(),
    }
}

/// Format an event with a colored tag.
#[must_use]
pub fn format_event(event: &ChildEvent) -> String {
    match event {
        ChildEvent::StdoutLine(line) => format!("{} {}", "[STDOUT]".dimmed(), line),
        ChildEvent::JsonObject(map) => {
            let text = serde_json::Value::Object(map.clone()).to_string();
            format!("{} {}", "[OBJECT]".cyan().bold(), truncate(&text, DEFAULT_MAX_LEN))
        }
        ChildEvent::JsonArray(items) => {
            let text = serde_json::Value::Array(items.clone()).to_string();
            format!("{} {}", "[ARRAY]".magenta().bold(), truncate(&text, DEFAULT_MAX_LEN))
        }
        ChildEvent::StderrData(text) => {
            format!("{} {}", "[STDERR]".yellow().bold(), text.trim_end_matches('\n'))
        }
        ChildEvent::Exit(info) if info.success() => {
            format!("{} {}", "[EXIT]".green().bold(), describe_exit(info))
        }
        ChildEvent::Exit(info) => format!("{} {}", "[EXIT]".red().bold(), describe_exit(info)),
    }
}

/// Format an event for raw relay, or `None` for `Exit`.
#[must_use]
pub fn format_raw(event: &ChildEvent) -> Option<String> {
    match event {
        ChildEvent::StdoutLine(line) => Some(format!("{line}\n")),
        ChildEvent::JsonObject(map) => Some(format!("{}\n", serde_json::Value::Object(map.clone()))),
        ChildEvent::JsonArray(items) => Some(format!("{}\n", serde_json::Value::Array(items.clone()))),
        ChildEvent::StderrData(text) => Some(text.clone()),
        ChildEvent::Exit(_) => None,
    }
}

/// Print one child event.
pub fn print_event(event: &ChildEvent, raw_mode: bool) {
    if raw_mode {
        if let Some(text) = format_raw(event) {
            if matches!(event, ChildEvent::StderrData(_)) {
                eprint!("{text}");
                let _ = io::stderr().flush();
            } else {
                print!("{text}");
            }
        }
    } else {
        println!("{}", format_event(event));
    }
    let _ = io::stdout().flush();
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}
