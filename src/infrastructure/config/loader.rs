use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;

use crate::domain::errors::ConfigError;
use crate::domain::models::{Config, RetryPolicy};
use crate::infrastructure::logging::parse_log_level;
use crate::services::prompt_optimizer::OptimizerSettings;
use crate::services::quality_evaluator::validate_neutral_score;

/// Default project config file.
pub const CONFIG_FILE: &str = "scrivener.yaml";

/// Optional local overrides, merged over [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "scrivener.local.yaml";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `scrivener.yaml`, or `path` when given
    /// 3. `scrivener.local.yaml` (optional)
    /// 4. Environment variables (`SCRIVENER_*`, `__` separates sections)
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let primary = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        if path.is_some() && !primary.exists() {
            anyhow::bail!("Config file not found: {}", primary.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(primary))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed("SCRIVENER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a single file, without local or env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        parse_log_level(&config.logging.level)?;

        let retry = &config.retry;
        RetryPolicy::check_limits(
            retry.max_attempts,
            retry.acceptance_threshold,
            retry.max_consecutive_provider_errors,
            Some(retry.generation_timeout_ms),
            Some(retry.judge_timeout_ms),
        )?;
        validate_neutral_score(config.evaluator.neutral_dimension_score)?;

        if config.optimizer.rounds == 0 {
            return Err(ConfigError::InvalidOptimizer(
                "rounds must be at least 1".to_string(),
            ));
        }
        OptimizerSettings::from_config(&config.optimizer)?;

        if config.provider.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "provider.base_url cannot be empty".to_string(),
            ));
        }
        if config.provider.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "provider.max_tokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
