//! Log output for applications embedding SoftLogic.
//!
//! The library crates emit records through the `log` facade; the subscriber
//! installed here forwards them together with `tracing` events.
//!
//! ```no_run
//! use softlogic::logging::{LogFormat, LogLevel, LoggerBuilder};
//!
//! LoggerBuilder::new()
//!     .with_format(LogFormat::Compact)
//!     .with_env_filter("softlogic_reasoner=trace,info")
//!     .init()
//!     .expect("logging already initialized");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{SoftLogicError, SoftLogicResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Multi-line, colored.
    Pretty,
    /// One line per event, no colors.
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerBuilder {
    format: LogFormat,
    level: LogLevel,
    env_filter: Option<String>,
    with_targets: bool,
    with_thread_ids: bool,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            level: LogLevel::Info,
            env_filter: None,
            with_targets: true,
            with_thread_ids: false,
        }
    }
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Filter directives such as `softlogic_grounding=debug,info`; overrides
    /// both the level and `RUST_LOG`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_targets(mut self, enabled: bool) -> Self {
        self.with_targets = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    fn filter(&self) -> SoftLogicResult<EnvFilter> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| SoftLogicError::Logging(format!("invalid filter {:?}: {}", directives, e))),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber. Fails if one is already installed.
    pub fn init(self) -> SoftLogicResult<()> {
        let filter = self.filter()?;
        let registry = tracing_subscriber::registry().with(filter);
        let result = match self.format {
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_target(self.with_targets)
                        .with_thread_ids(self.with_thread_ids)
                        .pretty(),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .with_target(self.with_targets)
                        .with_thread_ids(self.with_thread_ids)
                        .with_ansi(false)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .with_target(self.with_targets)
                        .with_thread_ids(self.with_thread_ids)
                        .json(),
                )
                .try_init(),
        };
        result.map_err(|e| SoftLogicError::Logging(e.to_string()))
    }
}

/// Install a subscriber with the given level and format.
pub fn init_logging(level: LogLevel, format: LogFormat) -> SoftLogicResult<()> {
    LoggerBuilder::new().with_level(level).with_format(format).init()
}
