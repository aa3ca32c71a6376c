//! Rubric scores and quality verdicts.
//!
//! The composite formula is fixed so the acceptance policy can be reproduced
//! outside this codebase:
//!
//! ```text
//! base      = mean(clarity, depth, nuance, specificity)
//! penalty   = min(1.5, 0.5*critical + 0.25*high + 0.10*medium)
//! composite = clamp(base - penalty, 0.0, 5.0)
//! ```
//!
//! Low-severity violations are recorded but never reduce the score.

use serde::{Deserialize, Serialize};

use super::violation::{Severity, Violation};

/// Upper bound of every rubric dimension and of the composite score.
pub const MAX_SCORE: f64 = 5.0;

/// Cap on the total violation penalty.
pub const MAX_PENALTY: f64 = 1.5;

const CRITICAL_WEIGHT: f64 = 0.5;
const HIGH_WEIGHT: f64 = 0.25;
const MEDIUM_WEIGHT: f64 = 0.10;

/// Four rubric dimensions, each in `[0, 5]`, produced by an external judge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub clarity: f64,
    pub depth: f64,
    pub nuance: f64,
    pub specificity: f64,
}

impl DimensionScore {
    /// Build a score, rejecting non-finite or out-of-range values.
    pub fn try_new(clarity: f64, depth: f64, nuance: f64, specificity: f64) -> Result<Self, String> {
        let score = Self {
            clarity,
            depth,
            nuance,
            specificity,
        };
        score.validate()?;
        Ok(score)
    }

    /// Every dimension set to the same value.
    pub fn uniform(value: f64) -> Self {
        Self {
            clarity: value,
            depth: value,
            nuance: value,
            specificity: value,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in self.named() {
            if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
                return Err(format!("{name} = {value} is outside [0, {MAX_SCORE}]"));
            }
        }
        Ok(())
    }

    pub fn mean(&self) -> f64 {
        (self.clarity + self.depth + self.nuance + self.specificity) / 4.0
    }

    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("clarity", self.clarity),
            ("depth", self.depth),
            ("nuance", self.nuance),
            ("specificity", self.specificity),
        ]
    }
}

/// Per-severity violation tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn tally(violations: &[Violation]) -> Self {
        let mut counts = Self::default();
        for violation in violations {
            match violation.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn penalty(&self) -> f64 {
        let raw = CRITICAL_WEIGHT * self.critical as f64
            + HIGH_WEIGHT * self.high as f64
            + MEDIUM_WEIGHT * self.medium as f64;
        raw.min(MAX_PENALTY)
    }
}

/// Result of evaluating one piece of generated text. Derived and read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub dimension_scores: DimensionScore,
    pub violations: Vec<Violation>,
    pub composite: f64,
    pub critical_count: usize,
    pub counts: SeverityCounts,
    /// Set when the judge failed and neutral dimension scores were substituted.
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl QualityVerdict {
    /// Combine dimension scores and violations into a verdict.
    ///
    /// Pure: identical inputs always produce an identical verdict.
    pub fn compose(dimension_scores: DimensionScore, violations: Vec<Violation>) -> Self {
        let counts = SeverityCounts::tally(&violations);
        let composite = (dimension_scores.mean() - counts.penalty()).clamp(0.0, MAX_SCORE);

        Self {
            dimension_scores,
            violations,
            composite,
            critical_count: counts.critical,
            counts,
            degraded: false,
            degraded_reason: None,
        }
    }

    /// Violation-only verdict using neutral dimension scores.
    pub fn degraded(
        neutral: DimensionScore,
        violations: Vec<Violation>,
        reason: impl Into<String>,
    ) -> Self {
        let mut verdict = Self::compose(neutral, violations);
        verdict.degraded = true;
        verdict.degraded_reason = Some(reason.into());
        verdict
    }

    /// Acceptance predicate. A critical violation is a hard gate that no
    /// composite score can override.
    pub fn is_acceptable(&self, acceptance_threshold: f64) -> bool {
        self.critical_count == 0 && self.composite >= acceptance_threshold
    }

    /// Violations worth feeding back to the provider on a retry.
    pub fn penalized_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity.is_penalized())
    }
}
