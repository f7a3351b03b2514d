//! Tracing setup for the service and the one-shot CLI

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

use crate::errors::AgentError;

/// Verbosity written in `settings.json`, case-insensitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogLevel(LevelName);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LevelName {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const TRACE: LogLevel = LogLevel(LevelName::Trace);
    pub const DEBUG: LogLevel = LogLevel(LevelName::Debug);
    pub const INFO: LogLevel = LogLevel(LevelName::Info);
    pub const WARN: LogLevel = LogLevel(LevelName::Warn);
    pub const ERROR: LogLevel = LogLevel(LevelName::Error);

    /// Directive understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelName::Trace => "trace",
            LevelName::Debug => "debug",
            LevelName::Info => "info",
            LevelName::Warn => "warn",
            LevelName::Error => "error",
        }
    }

    pub fn level(&self) -> Level {
        match self.0 {
            LevelName::Trace => Level::TRACE,
            LevelName::Debug => Level::DEBUG,
            LevelName::Info => Level::INFO,
            LevelName::Warn => Level::WARN,
            LevelName::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LevelName::Trace,
            "debug" => LevelName::Debug,
            "info" => LevelName::Info,
            "warn" | "warning" => LevelName::Warn,
            "error" => LevelName::Error,
            other => return Err(AgentError::ConfigError(format!("unknown log level `{other}`"))),
        };
        Ok(LogLevel(name))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where log lines go
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_level: LogLevel,

    /// Human-readable lines on stdout
    pub stdout: bool,

    /// One JSON object per line on stdout instead
    pub json_format: bool,

    /// Daily-rotated `gitdeploy.*.log` files under `log_dir`
    pub file: bool,
    pub log_dir: PathBuf,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::INFO,
            stdout: true,
            json_format: false,
            file: false,
            log_dir: PathBuf::from("/var/log/gitdeploy"),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(options: LogOptions) -> Result<(), AgentError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.as_str()));

    let plain = (options.stdout && !options.json_format).then(|| tracing_fmt::layer());
    let json = (options.stdout && options.json_format).then(|| tracing_fmt::layer().json());

    let file = match options.file {
        true => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("gitdeploy")
                .filename_suffix("log")
                .build(&options.log_dir)
                .map_err(|e| {
                    AgentError::ConfigError(format!(
                        "cannot log to {}: {e}",
                        options.log_dir.display()
                    ))
                })?;
            Some(tracing_fmt::layer().with_writer(appender).with_ansi(false))
        }
        false => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .with(file)
        .try_init()
        .map_err(|e| AgentError::ConfigError(format!("logging already initialized: {e}")))
}
