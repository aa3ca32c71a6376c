//! Quality evaluator: violation scan plus rubric judge, folded into a verdict.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{ConfigError, JudgeError};
use crate::domain::models::{DimensionScore, QualityVerdict, MAX_SCORE};
use crate::domain::ports::RubricJudge;
use crate::services::violation_scanner::{RuleSet, ViolationScanner};

/// Scores generated text. Never fails: a judge error produces a degraded
/// verdict built from the neutral dimension score.
#[derive(Clone)]
pub struct QualityEvaluator {
    rules: Arc<RuleSet>,
    judge: Arc<dyn RubricJudge>,
    neutral: DimensionScore,
    judge_timeout: Option<Duration>,
}

impl QualityEvaluator {
    pub fn new(
        rules: Arc<RuleSet>,
        judge: Arc<dyn RubricJudge>,
        neutral_dimension_score: f64,
    ) -> Result<Self, ConfigError> {
        validate_neutral_score(neutral_dimension_score)?;

        Ok(Self {
            rules,
            judge,
            neutral: DimensionScore::uniform(neutral_dimension_score),
            judge_timeout: None,
        })
    }

    pub fn with_judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = Some(timeout);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Scan, ask the judge, and compose the verdict.
    #[tracing::instrument(skip_all, fields(judge = self.judge.name(), chars = text.chars().count()))]
    pub async fn evaluate(&self, text: &str) -> QualityVerdict {
        let violations = ViolationScanner::scan(text, &self.rules);

        match self.judge_score(text).await {
            Ok(scores) => QualityVerdict::compose(scores, violations),
            Err(err) => {
                tracing::warn!(error = %err, "Rubric judge unusable, using neutral dimension scores");
                QualityVerdict::degraded(self.neutral, violations, err.to_string())
            }
        }
    }

    async fn judge_score(&self, text: &str) -> Result<DimensionScore, JudgeError> {
        let scores = match self.judge_timeout {
            Some(limit) => tokio::time::timeout(limit, self.judge.score(text))
                .await
                .map_err(|_| JudgeError::Timeout {
                    after_ms: limit.as_millis() as u64,
                })??,
            None => self.judge.score(text).await?,
        };

        scores.validate().map_err(JudgeError::Malformed)?;
        Ok(scores)
    }
}

/// Fallback dimension score used when the judge is unusable.
pub fn validate_neutral_score(score: f64) -> Result<(), ConfigError> {
    if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
        return Err(ConfigError::ValidationFailed(format!(
            "neutral_dimension_score {score} is outside [0, {MAX_SCORE}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::judges::ScriptedJudge;
    use crate::domain::models::{Rule, Severity};

    fn rules() -> Arc<RuleSet> {
        Arc::new(
            RuleSet::compile(vec![
                Rule::new("banned_phrase", "delve", Severity::Critical),
                Rule::new("hedging", "arguably", Severity::Medium),
                Rule::new("filler", "very", Severity::Low),
            ])
            .unwrap(),
        )
    }

    fn evaluator(judge: ScriptedJudge) -> QualityEvaluator {
        QualityEvaluator::new(rules(), Arc::new(judge), 2.5).unwrap()
    }

    /// Captures the `chars` field of any span opened while installed.
    struct CharsField(Arc<std::sync::Mutex<Option<u64>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CharsField {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Visit<'a>(&'a mut Option<u64>);
            impl tracing::field::Visit for Visit<'_> {
                fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
                    if field.name() == "chars" {
                        *self.0 = Some(value);
                    }
                }
                fn record_debug(&mut self, _: &tracing::field::Field, _: &dyn std::fmt::Debug) {}
            }

            let mut seen = None;
            attrs.record(&mut Visit(&mut seen));
            if seen.is_some() {
                *self.0.lock().unwrap() = seen;
            }
        }
    }

    #[tokio::test]
    async fn test_span_counts_characters_not_bytes() {
        use tracing_subscriber::prelude::*;

        let seen = Arc::new(std::sync::Mutex::new(None));
        let subscriber = tracing_subscriber::registry().with(CharsField(seen.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let eval = evaluator(ScriptedJudge::constant(DimensionScore::uniform(5.0)));
        let text = "naïve café";
        assert_eq!(text.len(), 12);
        eval.evaluate(text).await;

        assert_eq!(*seen.lock().unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_clean_text_with_perfect_scores() {
        let eval = evaluator(ScriptedJudge::constant(DimensionScore::uniform(5.0)));
        let verdict = eval.evaluate("A clean sentence.").await;
        assert!((verdict.composite - 5.0).abs() < f64::EPSILON);
        assert!(!verdict.degraded);
        assert!(verdict.is_acceptable(4.5));
    }

    #[tokio::test]
    async fn test_violations_reduce_composite() {
        let eval = evaluator(ScriptedJudge::constant(DimensionScore::uniform(4.0)));
        let verdict = eval
            .evaluate("We delve, arguably, into very deep water.")
            .await;
        assert_eq!(verdict.critical_count, 1);
        assert_eq!(verdict.counts.low, 1);
        assert!((verdict.composite - 3.4).abs() < 1e-9);
        assert!(!verdict.is_acceptable(0.0));
    }

    #[tokio::test]
    async fn test_malformed_judge_degrades() {
        let eval = evaluator(ScriptedJudge::new(vec![Err(JudgeError::Malformed(
            "missing nuance".to_string(),
        ))]));
        let verdict = eval.evaluate("arguably fine").await;
        assert!(verdict.degraded);
        assert!((verdict.composite - 2.4).abs() < 1e-9);
        assert!(verdict
            .degraded_reason
            .as_deref()
            .unwrap()
            .contains("missing nuance"));
    }

    #[tokio::test]
    async fn test_out_of_range_scores_degrade() {
        let eval = evaluator(ScriptedJudge::constant(DimensionScore {
            clarity: 7.0,
            depth: 4.0,
            nuance: 4.0,
            specificity: 4.0,
        }));
        let verdict = eval.evaluate("text").await;
        assert!(verdict.degraded);
        assert!((verdict.composite - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_slow_judge_times_out_and_degrades() {
        let judge = ScriptedJudge::constant(DimensionScore::uniform(5.0))
            .with_delay(Duration::from_millis(200));
        let eval = evaluator(judge).with_judge_timeout(Duration::from_millis(10));
        let verdict = eval.evaluate("text").await;
        assert!(verdict.degraded);
        assert!(verdict.degraded_reason.unwrap().contains("timed out"));
    }

    #[test]
    fn test_rejects_out_of_range_neutral() {
        let judge = Arc::new(ScriptedJudge::constant(DimensionScore::uniform(3.0)));
        assert!(QualityEvaluator::new(rules(), judge, 6.0).is_err());
    }
}
