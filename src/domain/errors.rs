//! Domain errors for the scrivener generation engine.
//!
//! Only [`ConfigError`] ever escapes a session group to the caller. Provider and
//! judge failures are recoverable per attempt and end up as data in the attempt
//! history.

use thiserror::Error;

/// Fatal configuration problems detected at session-group startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Rule {index} ({category}) has an invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        index: usize,
        category: String,
        pattern: String,
        reason: String,
    },

    #[error("Rule {index} ({category}) has an empty pattern")]
    EmptyPattern { index: usize, category: String },

    #[error("Unknown severity `{0}`. Must be one of: critical, high, medium, low")]
    UnknownSeverity(String),

    #[error("Unknown match kind `{0}`. Must be one of: literal, word, regex")]
    UnknownMatchKind(String),

    #[error("Prompt library has no tier-0 variant")]
    MissingTierZero,

    #[error("Prompt library defines tier {0} more than once")]
    DuplicateTier(u32),

    #[error("Prompt library defines variant id `{0}` more than once")]
    DuplicateVariantId(String),

    #[error("Variant `{0}` has an empty template")]
    EmptyTemplate(String),

    #[error("Escalation ladder references unknown variant `{0}`")]
    UnknownVariant(String),

    #[error("Escalation ladder must start at tier 0 and strictly increase: {0}")]
    InvalidLadder(String),

    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid optimizer settings: {0}")]
    InvalidOptimizer(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Unparseable { path: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Failure of a single generation-provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Provider call failed: {0}")]
    Failed(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failure of a rubric-judge call. Every variant degrades the verdict.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgeError {
    #[error("Malformed evaluation response: {0}")]
    Malformed(String),

    #[error("Judge call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Judge call failed: {0}")]
    Failed(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
