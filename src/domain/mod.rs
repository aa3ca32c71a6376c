//! Domain layer for the scrivener generation engine
//!
//! Pure data types, scoring rules and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ConfigError, ConfigResult, JudgeError, ProviderError};
