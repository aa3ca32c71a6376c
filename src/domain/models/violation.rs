//! Violations flagged by the scanner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ConfigError;

/// Violation severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether this severity reduces the composite score.
    pub fn is_penalized(&self) -> bool {
        !matches!(self, Self::Low)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(ConfigError::UnknownSeverity(other.to_string())),
        }
    }
}

/// Category of a policy or style rule.
///
/// Well-known categories get their own variant; anything else from the rule
/// configuration is kept verbatim in [`ViolationCategory::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationCategory {
    /// Zero-tolerance phrases.
    BannedPhrase,
    Hedging,
    VagueQuantifier,
    Cliche,
    Filler,
    Custom(String),
}

impl ViolationCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BannedPhrase => "banned_phrase",
            Self::Hedging => "hedging",
            Self::VagueQuantifier => "vague_quantifier",
            Self::Cliche => "cliche",
            Self::Filler => "filler",
            Self::Custom(name) => name,
        }
    }

    /// Zero-tolerance categories match literal substrings by default.
    pub fn is_zero_tolerance(&self) -> bool {
        matches!(self, Self::BannedPhrase)
    }
}

impl From<String> for ViolationCategory {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "banned_phrase" | "banned" => Self::BannedPhrase,
            "hedging" => Self::Hedging,
            "vague_quantifier" => Self::VagueQuantifier,
            "cliche" => Self::Cliche,
            "filler" => Self::Filler,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for ViolationCategory {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ViolationCategory> for String {
    fn from(value: ViolationCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte range `[start, end)` into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A flagged span of text matching a rule. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub category: ViolationCategory,
    pub severity: Severity,
    pub matched_text: String,
    pub span: Span,
}
