//! YAML loaders for rule, variant, scenario and fixture files.
//!
//! Every file is a top-level YAML sequence. Read and parse failures become
//! [`ConfigError`] values naming the offending path.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::domain::errors::ConfigError;
use crate::domain::models::{DimensionScore, Excerpt, PromptVariant, RuleSpec, Scenario};

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<T> = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Unparseable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), count = items.len(), "Loaded YAML records");
    Ok(items)
}

pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<RuleSpec>, ConfigError> {
    read_yaml(path.as_ref())
}

pub fn load_variants(path: impl AsRef<Path>) -> Result<Vec<PromptVariant>, ConfigError> {
    read_yaml(path.as_ref())
}

/// Scenarios must carry unique ids; duplicates are rejected here rather than
/// at optimizer start so the error names the file.
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<Scenario>, ConfigError> {
    let path = path.as_ref();
    let scenarios: Vec<Scenario> = read_yaml(path)?;
    let mut seen = std::collections::HashSet::new();
    for scenario in &scenarios {
        if !seen.insert(scenario.id.as_str()) {
            return Err(ConfigError::Unparseable {
                path: path.display().to_string(),
                reason: format!("duplicate scenario id `{}`", scenario.id),
            });
        }
    }
    Ok(scenarios)
}

pub fn load_excerpts(path: impl AsRef<Path>) -> Result<Vec<Excerpt>, ConfigError> {
    read_yaml(path.as_ref())
}

/// Canned provider replies, consumed in order by the scripted provider.
pub fn load_responses(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
    read_yaml(path.as_ref())
}

/// Canned rubric scores, consumed in order by the scripted judge.
pub fn load_scores(path: impl AsRef<Path>) -> Result<Vec<DimensionScore>, ConfigError> {
    let path = path.as_ref();
    let scores: Vec<DimensionScore> = read_yaml(path)?;
    for (index, score) in scores.iter().enumerate() {
        score.validate().map_err(|reason| ConfigError::Unparseable {
            path: path.display().to_string(),
            reason: format!("score {index}: {reason}"),
        })?;
    }
    Ok(scores)
}
