//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output on stderr
//! - Optional rolling JSON log files via tracing-appender

pub mod logger;

pub use logger::{parse_log_level, LoggerImpl};
