//! Generation sessions, attempts and the retry policy that governs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::score::{QualityVerdict, MAX_SCORE};
use super::variant::{EscalationLadder, VariantId};
use crate::domain::errors::ConfigError;

/// Immutable per-session retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub acceptance_threshold: f64,
    pub escalation_ladder: EscalationLadder,
    /// Consecutive provider failures (errors or timeouts) that abort a session
    /// early, independent of `max_attempts`.
    pub max_consecutive_provider_errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_timeout_ms: Option<u64>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        acceptance_threshold: f64,
        escalation_ladder: EscalationLadder,
    ) -> Result<Self, ConfigError> {
        let policy = Self {
            max_attempts,
            acceptance_threshold,
            escalation_ladder,
            max_consecutive_provider_errors: max_attempts,
            generation_timeout_ms: None,
            judge_timeout_ms: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn with_max_consecutive_provider_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_provider_errors = limit;
        self
    }

    pub fn with_generation_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.generation_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_judge_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.judge_timeout_ms = Some(timeout_ms);
        self
    }

    /// Same policy with a different ladder. Used by the optimizer to pin a
    /// candidate as the tier-0 rung.
    pub fn with_ladder(&self, escalation_ladder: EscalationLadder) -> Self {
        Self {
            escalation_ladder,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::check_limits(
            self.max_attempts,
            self.acceptance_threshold,
            self.max_consecutive_provider_errors,
            self.generation_timeout_ms,
            self.judge_timeout_ms,
        )
    }

    /// Bounds shared by every policy, checked before a ladder exists.
    pub fn check_limits(
        max_attempts: u32,
        acceptance_threshold: f64,
        max_consecutive_provider_errors: u32,
        generation_timeout_ms: Option<u64>,
        judge_timeout_ms: Option<u64>,
    ) -> Result<(), ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !acceptance_threshold.is_finite() || !(0.0..=MAX_SCORE).contains(&acceptance_threshold) {
            return Err(ConfigError::InvalidPolicy(format!(
                "acceptance_threshold {acceptance_threshold} is outside [0, {MAX_SCORE}]"
            )));
        }
        if max_consecutive_provider_errors == 0 {
            return Err(ConfigError::InvalidPolicy(
                "max_consecutive_provider_errors must be at least 1".to_string(),
            ));
        }
        if generation_timeout_ms == Some(0) || judge_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidPolicy(
                "timeouts must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// A ranked text excerpt supplied by the retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    pub text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Excerpt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: 0.0,
            source: None,
        }
    }
}

/// What the caller wants written, plus supporting excerpts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub task: String,
    #[serde(default)]
    pub excerpts: Vec<Excerpt>,
}

impl SessionContext {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            excerpts: Vec::new(),
        }
    }

    pub fn with_excerpts(mut self, excerpts: Vec<Excerpt>) -> Self {
        self.excerpts = excerpts;
        self
    }
}

/// Outcome recorded for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Retried,
    TimedOut,
    ProviderError,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Retried => "retried",
            Self::TimedOut => "timed_out",
            Self::ProviderError => "provider_error",
        }
    }

    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::TimedOut | Self::ProviderError)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider call and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Starts at 1, strictly increasing, never reused within a session.
    pub attempt_number: u32,
    pub prompt_variant: VariantId,
    pub tier: u32,
    /// Empty when the provider produced nothing.
    pub generated_text: String,
    /// `None` when the provider failed before any text could be evaluated.
    pub verdict: Option<QualityVerdict>,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationAttempt {
    pub fn composite(&self) -> Option<f64> {
        self.verdict.as_ref().map(|v| v.composite)
    }
}

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionOutcome {
    Accepted,
    Exhausted,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// Why an exhausted session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    AttemptsSpent,
    ConsecutiveProviderErrors,
    Cancelled,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptsSpent => write!(f, "attempts_spent"),
            Self::ConsecutiveProviderErrors => write!(f, "consecutive_provider_errors"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Full record of one accept/retry lifecycle, returned to the caller as an
/// audit document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSession {
    pub id: Uuid,
    pub context: SessionContext,
    pub policy: RetryPolicy,
    pub attempts: Vec<GenerationAttempt>,
    pub outcome: SessionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustion_reason: Option<ExhaustionReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationSession {
    /// Set whenever the session ended without an accepted attempt.
    pub fn warning(&self) -> bool {
        self.outcome == SessionOutcome::Exhausted
    }

    pub fn accepted_attempt(&self) -> Option<&GenerationAttempt> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Accepted)
    }

    /// Highest composite among evaluated attempts; ties go to the earliest.
    pub fn best_attempt(&self) -> Option<&GenerationAttempt> {
        self.attempts
            .iter()
            .filter_map(|a| a.composite().map(|c| (a, c)))
            .fold(None, |best: Option<(&GenerationAttempt, f64)>, (attempt, score)| {
                match best {
                    Some((_, best_score)) if score <= best_score => best,
                    _ => Some((attempt, score)),
                }
            })
            .map(|(attempt, _)| attempt)
    }

    /// The attempt a caller should use: the accepted one, else the best.
    pub fn final_attempt(&self) -> Option<&GenerationAttempt> {
        self.accepted_attempt().or_else(|| self.best_attempt())
    }

    pub fn final_text(&self) -> Option<&str> {
        self.final_attempt().map(|a| a.generated_text.as_str())
    }

    pub fn best_composite(&self) -> Option<f64> {
        self.final_attempt().and_then(GenerationAttempt::composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::score::DimensionScore;
    use crate::domain::models::variant::PromptVariant;

    fn ladder() -> EscalationLadder {
        EscalationLadder::new(vec![PromptVariant::new("base", "Write.", 0)]).unwrap()
    }

    fn attempt(number: u32, composite: Option<f64>, outcome: AttemptOutcome) -> GenerationAttempt {
        GenerationAttempt {
            attempt_number: number,
            prompt_variant: VariantId::from("base"),
            tier: 0,
            generated_text: format!("text {number}"),
            verdict: composite
                .map(|c| QualityVerdict::compose(DimensionScore::uniform(c), vec![])),
            outcome,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn session(attempts: Vec<GenerationAttempt>) -> GenerationSession {
        GenerationSession {
            id: Uuid::new_v4(),
            context: SessionContext::new("topic"),
            policy: RetryPolicy::new(3, 4.0, ladder()).unwrap(),
            attempts,
            outcome: SessionOutcome::Exhausted,
            exhaustion_reason: Some(ExhaustionReason::AttemptsSpent),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::new(0, 4.0, ladder()).is_err());
        assert!(RetryPolicy::new(3, 5.5, ladder()).is_err());
        assert!(RetryPolicy::new(3, f64::NAN, ladder()).is_err());
        let policy = RetryPolicy::new(3, 4.0, ladder()).unwrap();
        assert_eq!(policy.max_consecutive_provider_errors, 3);
        assert!(policy.with_max_consecutive_provider_errors(0).validate().is_err());
    }

    #[test]
    fn test_policy_with_empty_ladder_does_not_deserialize() {
        let json = r#"{
            "max_attempts": 3,
            "acceptance_threshold": 4.0,
            "escalation_ladder": [],
            "max_consecutive_provider_errors": 3
        }"#;
        assert!(serde_json::from_str::<RetryPolicy>(json).is_err());

        let policy = RetryPolicy::new(3, 4.0, ladder()).unwrap();
        let back: RetryPolicy =
            serde_json::from_str(&serde_json::to_string(&policy).unwrap()).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn test_best_attempt_prefers_highest_then_earliest() {
        let s = session(vec![
            attempt(1, Some(3.0), AttemptOutcome::Retried),
            attempt(2, Some(3.5), AttemptOutcome::Retried),
            attempt(3, None, AttemptOutcome::TimedOut),
            attempt(4, Some(3.5), AttemptOutcome::Retried),
        ]);
        assert_eq!(s.best_attempt().unwrap().attempt_number, 2);
        assert_eq!(s.final_text(), Some("text 2"));
        assert!(s.warning());
    }

    #[test]
    fn test_best_attempt_none_without_verdicts() {
        let s = session(vec![attempt(1, None, AttemptOutcome::ProviderError)]);
        assert!(s.best_attempt().is_none());
        assert!(s.final_text().is_none());
    }

    #[test]
    fn test_accepted_attempt_wins_final() {
        let mut s = session(vec![
            attempt(1, Some(4.8), AttemptOutcome::Retried),
            attempt(2, Some(4.2), AttemptOutcome::Accepted),
        ]);
        s.outcome = SessionOutcome::Accepted;
        assert_eq!(s.final_attempt().unwrap().attempt_number, 2);
        assert!(!s.warning());
    }

    #[test]
    fn test_session_serializes_outcome_uppercase() {
        let s = session(vec![]);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["outcome"], "EXHAUSTED");
        assert_eq!(json["exhaustion_reason"], "attempts_spent");
    }
}
