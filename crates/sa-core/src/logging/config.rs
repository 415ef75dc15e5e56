//! Log level and format selection.
//!
//! Precedence, lowest first: built-in default (`warn`, human), `RUST_LOG`,
//! `SA_LOG`, `SA_LOG_FORMAT`, then the `--log-level` / `--log-format` flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

const ENV_LEVEL: &str = "SA_LOG";
const ENV_FORMAT: &str = "SA_LOG_FORMAT";
const ENV_RUST_LOG: &str = "RUST_LOG";

/// Where log records are written and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `tracing_subscriber::fmt` on stderr.
    #[default]
    Human,
    /// One JSON object per line on stderr.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" | "pretty" => LogFormat::Human,
            "jsonl" | "json" | "ndjson" => LogFormat::Jsonl,
            other => return Err(format!("unknown log format '{}' (human, jsonl)", other)),
        };
        Ok(format)
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum severity that is emitted. Ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Level for `-v` repeated `count` times; zero means no override.
    pub fn from_verbosity(count: u8) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }

    /// Most verbose level named in a `RUST_LOG`-style directive list.
    ///
    /// `sa_core=debug,warn` yields `Debug`; directives without a known level
    /// are ignored.
    fn from_directives(directives: &str) -> Option<Self> {
        directives
            .split(',')
            .filter_map(|d| d.rsplit('=').next())
            .filter_map(|level| level.parse().ok())
            .min()
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "off" | "none" => LogLevel::Off,
            other => return Err(format!("unknown log level '{}'", other)),
        };
        Ok(level)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logging setup for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps on human output; JSONL records always carry `ts`.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::default(),
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment, then apply CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    fn from_lookup<F>(lookup: F, cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = match lookup(ENV_LEVEL) {
            Some(value) => value.parse().ok(),
            None => lookup(ENV_RUST_LOG).and_then(|v| LogLevel::from_directives(&v)),
        };
        let env_format = lookup(ENV_FORMAT).and_then(|v| v.parse().ok());

        let defaults = Self::default();
        Self {
            level: cli_level.or(env_level).unwrap_or(defaults.level),
            format: cli_format.or(env_format).unwrap_or(defaults.format),
            ..defaults
        }
    }

    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_level(self, level: LogLevel) -> Self {
        Self { level, ..self }
    }

    pub fn with_timestamps(self, timestamps: bool) -> Self {
        Self { timestamps, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn names_round_trip() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Off,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn defaults_are_quiet() {
        let config = LogConfig::from_lookup(env(&[]), None, None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn sa_log_beats_rust_log() {
        let config = LogConfig::from_lookup(
            env(&[("SA_LOG", "error"), ("RUST_LOG", "sa_core=trace")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Error);
    }

    #[test]
    fn rust_log_takes_most_verbose_directive() {
        let config =
            LogConfig::from_lookup(env(&[("RUST_LOG", "warn,sa_core=debug")]), None, None);
        assert_eq!(config.level, LogLevel::Debug);
        let config = LogConfig::from_lookup(env(&[("RUST_LOG", "sa_core")]), None, None);
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn cli_overrides_env() {
        let config = LogConfig::from_lookup(
            env(&[("SA_LOG", "error"), ("SA_LOG_FORMAT", "human")]),
            Some(LogLevel::Trace),
            Some(LogFormat::Jsonl),
        );
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn verbosity_counts() {
        assert_eq!(LogLevel::from_verbosity(0), None);
        assert_eq!(LogLevel::from_verbosity(1), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_verbosity(2), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(7), Some(LogLevel::Trace));
    }

    #[test]
    fn builder() {
        let config = LogConfig::default()
            .with_format(LogFormat::Jsonl)
            .with_level(LogLevel::Debug)
            .with_timestamps(false);
        assert_eq!(config.format, LogFormat::Jsonl);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.timestamps);
    }
}
