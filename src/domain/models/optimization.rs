//! Prompt-optimization scenarios, rounds, events and summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::score::QualityVerdict;
use super::session::{SessionContext, SessionOutcome};
use super::variant::PromptVariant;

/// A scripted generation request the optimizer replays every round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(flatten)]
    pub context: SessionContext,
}

impl Scenario {
    pub fn new(id: impl Into<String>, context: SessionContext) -> Self {
        Self {
            id: id.into(),
            context,
        }
    }
}

/// One candidate variant evaluated against one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRound {
    pub round_number: u32,
    pub scenario_id: String,
    pub candidate_variant: PromptVariant,
    pub resulting_verdict: QualityVerdict,
    pub session_outcome: SessionOutcome,
    /// `candidate composite - best known composite`; zero for the baseline round.
    pub improvement_delta: f64,
    /// Whether the candidate replaced the scenario's best variant.
    pub adopted: bool,
    pub completed_at: DateTime<Utc>,
}

impl OptimizationRound {
    pub fn composite(&self) -> f64 {
        self.resulting_verdict.composite
    }
}

/// Append-only event stream emitted while the optimizer runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerEvent {
    RoundCompleted {
        scenario_id: String,
        round_number: u32,
        composite: f64,
        improvement_delta: f64,
        adopted: bool,
    },
    RoundSkipped {
        scenario_id: String,
        round_number: u32,
        reason: String,
    },
    ScenarioConverged {
        scenario_id: String,
        round_number: u32,
        best_score: f64,
    },
    ScenarioFinished {
        scenario_id: String,
        rounds_used: u32,
        converged: bool,
    },
}

/// Per-scenario outcome of an optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario_id: String,
    /// Composite of the first completed round (normally round 1).
    pub baseline_score: Option<f64>,
    /// Composite of the last completed round.
    pub final_score: Option<f64>,
    pub best_score: Option<f64>,
    pub converged: bool,
    pub rounds_used: u32,
    /// Rounds that failed or panicked and were skipped.
    pub incomplete_rounds: Vec<u32>,
    pub best_variant: PromptVariant,
    pub history: Vec<OptimizationRound>,
}

/// Report handed to downstream tooling after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub rounds_budget: u32,
    pub scenarios: Vec<ScenarioSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationSummary {
    pub fn scenario(&self, id: &str) -> Option<&ScenarioSummary> {
        self.scenarios.iter().find(|s| s.scenario_id == id)
    }

    pub fn converged_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.converged).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_yaml_flattens_context() {
        let yaml = r"
id: launch-post
task: Announce the release
excerpts:
  - text: The release adds offline mode.
    score: 0.9
";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.id, "launch-post");
        assert_eq!(scenario.context.task, "Announce the release");
        assert_eq!(scenario.context.excerpts.len(), 1);
    }

    #[test]
    fn test_event_tagging() {
        let event = OptimizerEvent::ScenarioConverged {
            scenario_id: "a".to_string(),
            round_number: 4,
            best_score: 4.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scenario_converged");
        assert_eq!(json["round_number"], 4);
    }
}
