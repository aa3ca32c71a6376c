//! Immutable startup snapshot shared by every session in a run.
//!
//! Rules, the prompt library and the retry policy are validated once here.
//! Changing any of them means building a new group.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::ConfigError;
use crate::domain::models::{
    Config, EscalationLadder, PromptLibrary, PromptVariant, RetryPolicy, RuleSpec, VariantId,
};
use crate::domain::ports::{GenerationProvider, RubricJudge};
use crate::services::prompt_optimizer::{OptimizerSettings, PromptOptimizer};
use crate::services::quality_evaluator::QualityEvaluator;
use crate::services::retry_orchestrator::RetryOrchestrator;
use crate::services::violation_scanner::RuleSet;

#[derive(Debug, Clone)]
pub struct SessionGroup {
    rules: Arc<RuleSet>,
    library: Arc<PromptLibrary>,
    policy: RetryPolicy,
    neutral_dimension_score: f64,
    optimizer: OptimizerSettings,
}

impl SessionGroup {
    /// Validate every startup resource. Any problem is fatal.
    pub fn new(
        rules: Vec<RuleSpec>,
        variants: Vec<PromptVariant>,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let rules = RuleSet::from_specs(rules)?;
        let library = PromptLibrary::new(variants)?;

        let ladder_ids: Vec<VariantId> = config
            .retry
            .escalation_ladder
            .iter()
            .map(|id| VariantId::new(id.as_str()))
            .collect();
        let ladder = EscalationLadder::from_library(&library, &ladder_ids)?;

        let policy = RetryPolicy::new(
            config.retry.max_attempts,
            config.retry.acceptance_threshold,
            ladder,
        )?
        .with_max_consecutive_provider_errors(config.retry.max_consecutive_provider_errors)
        .with_generation_timeout_ms(config.retry.generation_timeout_ms)
        .with_judge_timeout_ms(config.retry.judge_timeout_ms);
        policy.validate()?;

        let optimizer = OptimizerSettings::from_config(&config.optimizer)?;

        tracing::info!(
            rules = rules.len(),
            variants = library.len(),
            ladder = policy.escalation_ladder.len(),
            max_attempts = policy.max_attempts,
            threshold = policy.acceptance_threshold,
            "Session group ready"
        );

        Ok(Self {
            rules: Arc::new(rules),
            library: Arc::new(library),
            policy,
            neutral_dimension_score: config.evaluator.neutral_dimension_score,
            optimizer,
        })
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn optimizer_settings(&self) -> &OptimizerSettings {
        &self.optimizer
    }

    pub fn evaluator(&self, judge: Arc<dyn RubricJudge>) -> Result<QualityEvaluator, ConfigError> {
        let evaluator =
            QualityEvaluator::new(self.rules.clone(), judge, self.neutral_dimension_score)?;
        Ok(match self.policy.judge_timeout_ms {
            Some(ms) => evaluator.with_judge_timeout(Duration::from_millis(ms)),
            None => evaluator,
        })
    }

    pub fn orchestrator(
        &self,
        provider: Arc<dyn GenerationProvider>,
        judge: Arc<dyn RubricJudge>,
    ) -> Result<RetryOrchestrator, ConfigError> {
        RetryOrchestrator::new(provider, self.evaluator(judge)?, self.policy.clone())
    }

    pub fn optimizer(
        &self,
        provider: Arc<dyn GenerationProvider>,
        judge: Arc<dyn RubricJudge>,
    ) -> Result<PromptOptimizer, ConfigError> {
        PromptOptimizer::new(
            provider,
            self.evaluator(judge)?,
            self.policy.clone(),
            self.optimizer,
        )
    }
}
