//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use scrivener::adapters::judges::ScriptedJudge;
use scrivener::adapters::providers::ScriptedProvider;
use scrivener::domain::models::{Config, PromptVariant, RuleSpec};
use scrivener::services::SessionGroup;

pub fn rule(category: &str, pattern: &str, severity: &str) -> RuleSpec {
    RuleSpec {
        category: category.to_string(),
        pattern: pattern.to_string(),
        severity: severity.to_string(),
        case_sensitive: false,
        match_kind: None,
    }
}

pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        rule("banned_phrase", "as an ai language model", "critical"),
        rule("hedging", "arguably", "medium"),
        rule("cliche", "game changer", "high"),
        rule("filler", "basically", "low"),
    ]
}

/// Three-rung ladder: `default` (0), `firm` (1), `strict` (2).
pub fn ladder_variants() -> Vec<PromptVariant> {
    vec![
        PromptVariant::new("default", "Write about {task}.\n{excerpts}", 0),
        PromptVariant::new(
            "firm",
            "Write about {task}.\nAvoid hedging.\n{feedback}",
            1,
        ),
        PromptVariant::new(
            "strict",
            "!Never invent facts.\nWrite about {task}.\nAvoid hedging.\nUse concrete numbers.\n{feedback}",
            2,
        ),
    ]
}

pub fn config(max_attempts: u32, threshold: f64) -> Config {
    let mut config = Config::default();
    config.retry.max_attempts = max_attempts;
    config.retry.acceptance_threshold = threshold;
    config.retry.max_consecutive_provider_errors = max_attempts;
    config.optimizer.min_call_interval_ms = 0;
    config
}

pub fn group(config: &Config) -> SessionGroup {
    SessionGroup::new(default_rules(), ladder_variants(), config).unwrap()
}

pub fn provider(replies: &[&str]) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::replies(replies.iter().copied()))
}

pub fn judge(values: &[f64]) -> Arc<ScriptedJudge> {
    Arc::new(ScriptedJudge::uniform_sequence(values))
}
