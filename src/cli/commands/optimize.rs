//! `scrivener optimize`: tune the base variant against replayed scenarios.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{build_backends, load_session_group};
use crate::cli::output::{format_score, list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, OptimizationSummary, OptimizerEvent};
use crate::infrastructure::library;
use crate::services::InstructionMutator;

#[derive(Debug, serde::Serialize)]
pub struct OptimizeOutput {
    pub summary: OptimizationSummary,
}

impl CommandOutput for OptimizeOutput {
    fn to_human(&self) -> String {
        let summary = &self.summary;
        if summary.scenarios.is_empty() {
            return "No scenarios found.".to_string();
        }

        let mut table = list_table(&[
            "scenario", "baseline", "final", "best", "rounds", "converged", "best variant",
        ]);
        for s in &summary.scenarios {
            table.add_row(vec![
                truncate(&s.scenario_id, 24),
                format_score(s.baseline_score),
                format_score(s.final_score),
                format_score(s.best_score),
                if s.incomplete_rounds.is_empty() {
                    s.rounds_used.to_string()
                } else {
                    format!("{} ({} skipped)", s.rounds_used, s.incomplete_rounds.len())
                },
                if s.converged { "yes" } else { "no" }.to_string(),
                s.best_variant.id.to_string(),
            ]);
        }

        format!(
            "{} scenario(s), {} converged, budget {} round(s):\n{}",
            summary.scenarios.len(),
            summary.converged_count(),
            summary.rounds_budget,
            table
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn log_event(event: &OptimizerEvent) {
    match event {
        OptimizerEvent::RoundCompleted {
            scenario_id,
            round_number,
            composite,
            improvement_delta,
            adopted,
        } => tracing::info!(
            scenario = %scenario_id,
            round = round_number,
            composite,
            delta = improvement_delta,
            adopted,
            "Round completed"
        ),
        OptimizerEvent::RoundSkipped {
            scenario_id,
            round_number,
            reason,
        } => tracing::debug!(scenario = %scenario_id, round = round_number, reason = %reason, "Round skipped"),
        OptimizerEvent::ScenarioConverged {
            scenario_id,
            round_number,
            best_score,
        } => tracing::info!(scenario = %scenario_id, round = round_number, best_score, "Scenario converged"),
        OptimizerEvent::ScenarioFinished {
            scenario_id,
            rounds_used,
            converged,
        } => tracing::info!(scenario = %scenario_id, rounds_used, converged, "Scenario finished"),
    }
}

pub async fn execute(
    config: &Config,
    scenarios_path: PathBuf,
    rounds: Option<u32>,
    output_path: Option<PathBuf>,
    json_mode: bool,
) -> Result<()> {
    let group = load_session_group(config)?;
    let backends = build_backends(config)?;
    let optimizer = group.optimizer(backends.provider, backends.judge)?;
    let scenarios = library::load_scenarios(&scenarios_path)?;
    let rounds = rounds.unwrap_or(config.optimizer.rounds);
    let mutation = Arc::new(InstructionMutator::from_config(&config.optimizer));

    let mut events = optimizer.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping before the next round");
            on_interrupt.cancel();
        }
    });

    let summary = optimizer
        .run_with_cancel(scenarios, rounds, mutation, cancel)
        .await
        .context("Optimizer run failed")?;
    watcher.abort();
    drop(optimizer);
    // Closed once the optimizer and its sender are gone.
    let _ = listener.await;

    if let Some(path) = output_path {
        let body = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Optimization summary written");
    }

    output(&OptimizeOutput { summary }, json_mode);
    Ok(())
}
