//! Wire-format trace output
//!
//! The engine driving this adapter consumes stderr as a stream of
//! single-key JSON objects, one per line: `{"<level>": "<message>"}`.
//! Levels are the fixed set error/warn/info/debug/trace. Regular log
//! macros are used throughout the codebase; this module installs an
//! `env_logger` format that renders them in the wire shape.

use std::io::Write;

use clap::ValueEnum;
use serde_json::{Map, Value};

/// Trace verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl TraceLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn level_key(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "error",
        log::Level::Warn => "warn",
        log::Level::Info => "info",
        log::Level::Debug => "debug",
        log::Level::Trace => "trace",
    }
}

/// Render one trace line in the wire format.
pub fn format_line(level: log::Level, message: &str) -> String {
    let mut object = Map::new();
    object.insert(
        level_key(level).to_string(),
        Value::String(message.to_string()),
    );
    // A single-key map always serializes
    serde_json::to_string(&Value::Object(object)).unwrap_or_default()
}

/// Initialize trace output to stderr at the given level.
pub fn init(level: TraceLevel) {
    env_logger::Builder::new()
        .filter_level(level.filter())
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(record.level(), &record.args().to_string())
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_a_single_key_object() {
        let line = format_line(log::Level::Debug, "loading cache");
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        let object = parsed.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["debug"], "loading cache");
    }

    #[test]
    fn all_five_levels_map_to_wire_keys() {
        let keys: Vec<&str> = [
            log::Level::Error,
            log::Level::Warn,
            log::Level::Info,
            log::Level::Debug,
            log::Level::Trace,
        ]
        .iter()
        .map(|l| level_key(*l))
        .collect();
        assert_eq!(keys, vec!["error", "warn", "info", "debug", "trace"]);
    }

    #[test]
    fn message_with_quotes_is_escaped() {
        let line = format_line(log::Level::Error, "bad \"input\"");
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["error"], "bad \"input\"");
    }
}
