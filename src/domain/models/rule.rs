//! Scanner rules and their configuration records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::violation::{Severity, ViolationCategory};
use crate::domain::errors::ConfigError;

/// How a rule pattern is matched against text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Plain substring, no boundaries.
    Literal,
    /// Escaped text bounded by word boundaries on both sides.
    Word,
    /// Raw regular expression.
    Regex,
}

impl MatchKind {
    pub fn default_for(category: &ViolationCategory) -> Self {
        if category.is_zero_tolerance() {
            Self::Literal
        } else {
            Self::Word
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Word => write!(f, "word"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

impl FromStr for MatchKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "literal" => Ok(Self::Literal),
            "word" => Ok(Self::Word),
            "regex" => Ok(Self::Regex),
            other => Err(ConfigError::UnknownMatchKind(other.to_string())),
        }
    }
}

/// Rule record as it appears in the rule configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub category: String,
    pub pattern: String,
    pub severity: String,
    #[serde(default)]
    pub case_sensitive: bool,
    /// `literal`, `word` or `regex`; inferred from the category when absent.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,
}

/// A typed scanner rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub category: ViolationCategory,
    pub pattern: String,
    pub severity: Severity,
    pub case_sensitive: bool,
    pub kind: MatchKind,
}

impl Rule {
    pub fn new(
        category: impl Into<ViolationCategory>,
        pattern: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let category = category.into();
        let kind = MatchKind::default_for(&category);
        Self {
            category,
            pattern: pattern.into(),
            severity,
            case_sensitive: false,
            kind,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn with_kind(mut self, kind: MatchKind) -> Self {
        self.kind = kind;
        self
    }
}

impl TryFrom<RuleSpec> for Rule {
    type Error = ConfigError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        let category = ViolationCategory::from(spec.category);
        let severity = spec.severity.parse::<Severity>()?;
        let kind = match spec.match_kind {
            Some(kind) => kind.parse::<MatchKind>()?,
            None => MatchKind::default_for(&category),
        };

        Ok(Self {
            category,
            pattern: spec.pattern,
            severity,
            case_sensitive: spec.case_sensitive,
            kind,
        })
    }
}
