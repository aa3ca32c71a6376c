//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - YAML loaders for rules, variants, scenarios and fixtures

pub mod config;
pub mod library;
pub mod logging;
