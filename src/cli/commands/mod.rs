//! CLI command implementations and the wiring they share.

pub mod generate;
pub mod optimize;
pub mod scan;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::judges::{LlmJudge, ScriptedJudge};
use crate::adapters::providers::anthropic::{AnthropicClient, AnthropicConfig};
use crate::adapters::providers::{AnthropicProvider, ScriptedProvider};
use crate::domain::models::{Config, DimensionScore, ProviderKind};
use crate::domain::ports::{GenerationProvider, RubricJudge};
use crate::infrastructure::library;
use crate::services::SessionGroup;

/// Provider and judge pair selected by `provider.kind`.
pub struct Backends {
    pub provider: Arc<dyn GenerationProvider>,
    pub judge: Arc<dyn RubricJudge>,
}

/// Build the provider and judge. The Anthropic pair shares one HTTP client.
pub fn build_backends(config: &Config) -> Result<Backends> {
    match config.provider.kind {
        ProviderKind::Anthropic => {
            let client = Arc::new(
                AnthropicClient::new(AnthropicConfig::from(&config.provider))
                    .context("Failed to build Anthropic client")?,
            );
            Ok(Backends {
                provider: Arc::new(AnthropicProvider::new(client.clone())),
                judge: Arc::new(LlmJudge::new(client, config.judge.model.clone())),
            })
        }
        ProviderKind::Scripted => {
            let provider = match &config.provider.responses_path {
                Some(path) => ScriptedProvider::replies(library::load_responses(path)?),
                None => ScriptedProvider::echo(),
            };
            let judge = match &config.judge.scores_path {
                Some(path) => {
                    ScriptedJudge::new(library::load_scores(path)?.into_iter().map(Ok).collect())
                }
                None => ScriptedJudge::constant(DimensionScore::uniform(
                    config.evaluator.neutral_dimension_score,
                )),
            };
            Ok(Backends {
                provider: Arc::new(provider),
                judge: Arc::new(judge),
            })
        }
    }
}

/// Load rules and variants from the configured paths and validate them.
pub fn load_session_group(config: &Config) -> Result<SessionGroup> {
    let rules = library::load_rules(&config.rules_path)
        .context("Failed to load rule configuration")?;
    let variants = library::load_variants(&config.variants_path)
        .context("Failed to load prompt library")?;
    SessionGroup::new(rules, variants, config).context("Invalid session configuration")
}
