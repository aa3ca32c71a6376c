//! Offline prompt optimizer.
//!
//! Replays every scenario for a fixed round budget. Round 1 measures the
//! library's tier-0 variant; each later round mutates the scenario's best
//! variant and runs a full retry session with the candidate pinned as tier 0.
//! Scenarios run concurrently; rounds within a scenario run in order.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ConfigError;
use crate::domain::models::{
    OptimizationRound, OptimizationSummary, OptimizerConfig, OptimizerEvent, PromptVariant,
    QualityVerdict, RetryPolicy, Scenario, ScenarioSummary, SessionOutcome,
};
use crate::domain::ports::{GenerationProvider, MutationStrategy};
use crate::services::call_pacer::CallPacer;
use crate::services::convergence::{ConvergenceCheck, ConvergencePolicy, ConvergenceTracker};
use crate::services::quality_evaluator::QualityEvaluator;
use crate::services::retry_orchestrator::RetryOrchestrator;

/// Composite differences smaller than this count as a tie.
const SCORE_TOLERANCE: f64 = 1e-9;

const EVENT_CAPACITY: usize = 1024;

/// Validated optimizer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub convergence: ConvergencePolicy,
    pub max_concurrent_scenarios: usize,
    pub min_call_interval_ms: u64,
}

impl OptimizerSettings {
    pub fn from_config(config: &OptimizerConfig) -> Result<Self, ConfigError> {
        if config.max_concurrent_scenarios == 0 {
            return Err(ConfigError::InvalidOptimizer(
                "max_concurrent_scenarios must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            convergence: ConvergencePolicy::from_config(config)?,
            max_concurrent_scenarios: config.max_concurrent_scenarios,
            min_call_interval_ms: config.min_call_interval_ms,
        })
    }
}

/// Runs optimization rounds over a set of scenarios.
pub struct PromptOptimizer {
    orchestrator: RetryOrchestrator,
    settings: OptimizerSettings,
    events: broadcast::Sender<OptimizerEvent>,
}

impl PromptOptimizer {
    /// Provider calls from every scenario share one [`CallPacer`].
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        evaluator: QualityEvaluator,
        policy: RetryPolicy,
        settings: OptimizerSettings,
    ) -> Result<Self, ConfigError> {
        let pacer = CallPacer::from_millis(settings.min_call_interval_ms);
        let orchestrator = RetryOrchestrator::new(provider, evaluator, policy)?.with_pacer(pacer);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            orchestrator,
            settings,
            events,
        })
    }

    /// Append-only stream of round and scenario events.
    pub fn subscribe(&self) -> broadcast::Receiver<OptimizerEvent> {
        self.events.subscribe()
    }

    pub async fn run(
        &self,
        scenarios: Vec<Scenario>,
        rounds: u32,
        mutation: Arc<dyn MutationStrategy>,
    ) -> Result<OptimizationSummary, ConfigError> {
        self.run_with_cancel(scenarios, rounds, mutation, CancellationToken::new())
            .await
    }

    /// Run every scenario for up to `rounds` rounds.
    ///
    /// Cancelling stops each scenario before its next round; completed rounds
    /// are still reported.
    #[tracing::instrument(skip_all, fields(scenarios = scenarios.len(), rounds = rounds, mutation = mutation.name()))]
    pub async fn run_with_cancel(
        &self,
        scenarios: Vec<Scenario>,
        rounds: u32,
        mutation: Arc<dyn MutationStrategy>,
        cancel: CancellationToken,
    ) -> Result<OptimizationSummary, ConfigError> {
        if rounds == 0 {
            return Err(ConfigError::InvalidOptimizer(
                "rounds must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(ConfigError::InvalidOptimizer(format!(
                    "duplicate scenario id `{}`",
                    scenario.id
                )));
            }
        }

        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_scenarios));
        let mut tasks = JoinSet::new();

        for (index, scenario) in scenarios.iter().cloned().enumerate() {
            let runner = ScenarioRunner {
                orchestrator: self.orchestrator.clone(),
                mutation: mutation.clone(),
                convergence: self.settings.convergence,
                events: self.events.clone(),
                cancel: cancel.clone(),
            };
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, runner.run(scenario, rounds).await)
            });
        }

        let mut results: Vec<Option<ScenarioSummary>> = vec![None; scenarios.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, summary)) => results[index] = Some(summary),
                Err(err) => tracing::error!(error = %err, "Scenario task failed"),
            }
        }

        let base = self.orchestrator.policy().escalation_ladder.base().clone();
        let summaries = results
            .into_iter()
            .zip(&scenarios)
            .map(|(summary, scenario)| {
                summary.unwrap_or_else(|| ScenarioSummary {
                    scenario_id: scenario.id.clone(),
                    baseline_score: None,
                    final_score: None,
                    best_score: None,
                    converged: false,
                    rounds_used: 0,
                    incomplete_rounds: (1..=rounds).collect(),
                    best_variant: base.clone(),
                    history: Vec::new(),
                })
            })
            .collect();

        let summary = OptimizationSummary {
            rounds_budget: rounds,
            scenarios: summaries,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            converged = summary.converged_count(),
            total = summary.scenarios.len(),
            "Optimization run finished"
        );
        Ok(summary)
    }
}

/// Everything one scenario task needs, owned.
struct ScenarioRunner {
    orchestrator: RetryOrchestrator,
    mutation: Arc<dyn MutationStrategy>,
    convergence: ConvergencePolicy,
    events: broadcast::Sender<OptimizerEvent>,
    cancel: CancellationToken,
}

/// Best-known state of a scenario between rounds.
struct Best {
    variant: PromptVariant,
    score: Option<f64>,
}

impl ScenarioRunner {
    #[tracing::instrument(skip_all, fields(scenario_id = %scenario.id))]
    async fn run(self, scenario: Scenario, rounds: u32) -> ScenarioSummary {
        let base = self.orchestrator.policy().escalation_ladder.base().clone();
        let mut best = Best {
            variant: base.clone(),
            score: None,
        };
        let mut tracker = ConvergenceTracker::new(self.convergence);
        let mut history: Vec<OptimizationRound> = Vec::new();
        let mut incomplete_rounds = Vec::new();
        let mut rounds_used = 0;

        for round in 1..=rounds {
            if self.cancel.is_cancelled() {
                tracing::info!(round, "Optimization cancelled");
                break;
            }

            let candidate = if round == 1 {
                base.clone()
            } else {
                self.mutation.mutate(&best.variant, round)
            };

            let outcome = AssertUnwindSafe(self.run_round(&scenario, &candidate))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(format!("round panicked: {}", panic_message(&*panic))));

            let (verdict, session_outcome) = match outcome {
                Ok(result) => result,
                Err(reason) if self.cancel.is_cancelled() => {
                    tracing::info!(round, reason = %reason, "Optimization cancelled mid-round");
                    break;
                }
                Err(reason) => {
                    rounds_used = round;
                    tracing::warn!(round, reason = %reason, "Round incomplete, continuing");
                    incomplete_rounds.push(round);
                    self.emit(OptimizerEvent::RoundSkipped {
                        scenario_id: scenario.id.clone(),
                        round_number: round,
                        reason,
                    });
                    continue;
                }
            };

            rounds_used = round;
            let composite = verdict.composite;
            let (improvement_delta, adopted) = match best.score {
                None => (0.0, true),
                Some(best_score) => {
                    let delta = composite - best_score;
                    let adopted = delta > SCORE_TOLERANCE
                        || (delta.abs() <= SCORE_TOLERANCE
                            && candidate.is_shorter_than(&best.variant));
                    (delta, adopted)
                }
            };
            if adopted {
                best.score = Some(best.score.map_or(composite, |s| s.max(composite)));
                best.variant = candidate.clone();
            }

            tracing::info!(
                round,
                variant = %candidate.id,
                composite,
                improvement_delta,
                adopted,
                "Round completed"
            );
            self.emit(OptimizerEvent::RoundCompleted {
                scenario_id: scenario.id.clone(),
                round_number: round,
                composite,
                improvement_delta,
                adopted,
            });

            history.push(OptimizationRound {
                round_number: round,
                scenario_id: scenario.id.clone(),
                candidate_variant: candidate,
                resulting_verdict: verdict,
                session_outcome,
                improvement_delta,
                adopted,
                completed_at: Utc::now(),
            });

            if let ConvergenceCheck::Converged { std_dev } = tracker.observe(composite) {
                let best_score = best.score.unwrap_or(composite);
                tracing::info!(round, std_dev, best_score, "Scenario converged");
                self.emit(OptimizerEvent::ScenarioConverged {
                    scenario_id: scenario.id.clone(),
                    round_number: round,
                    best_score,
                });
                for skipped in round + 1..=rounds {
                    self.emit(OptimizerEvent::RoundSkipped {
                        scenario_id: scenario.id.clone(),
                        round_number: skipped,
                        reason: "converged".to_string(),
                    });
                }
                break;
            }
        }

        let converged = tracker.is_converged();
        self.emit(OptimizerEvent::ScenarioFinished {
            scenario_id: scenario.id.clone(),
            rounds_used,
            converged,
        });

        ScenarioSummary {
            scenario_id: scenario.id,
            baseline_score: history.first().map(OptimizationRound::composite),
            final_score: history.last().map(OptimizationRound::composite),
            best_score: best.score,
            converged,
            rounds_used,
            incomplete_rounds,
            best_variant: best.variant,
            history,
        }
    }

    /// One retry session with `candidate` as the tier-0 rung.
    async fn run_round(
        &self,
        scenario: &Scenario,
        candidate: &PromptVariant,
    ) -> Result<(QualityVerdict, SessionOutcome), String> {
        let policy = self.orchestrator.policy();
        let ladder = policy
            .escalation_ladder
            .with_base(candidate.clone())
            .map_err(|e| e.to_string())?;
        let orchestrator = self
            .orchestrator
            .with_policy(policy.with_ladder(ladder))
            .map_err(|e| e.to_string())?;

        let session = orchestrator
            .run_with_cancel(scenario.context.clone(), &self.cancel)
            .await;

        let verdict = session
            .final_attempt()
            .and_then(|attempt| attempt.verdict.clone())
            .ok_or_else(|| match session.exhaustion_reason {
                Some(reason) => format!("no evaluated attempt ({reason})"),
                None => "no evaluated attempt".to_string(),
            })?;

        Ok((verdict, session.outcome))
    }

    fn emit(&self, event: OptimizerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::judges::ScriptedJudge;
    use crate::adapters::providers::ScriptedProvider;
    use crate::domain::models::{DimensionScore, EscalationLadder, SessionContext};
    use crate::services::mutation::InstructionMutator;
    use crate::services::violation_scanner::RuleSet;

    fn settings(window: usize) -> OptimizerSettings {
        OptimizerSettings {
            convergence: ConvergencePolicy::new(window, 0.01, 2).unwrap(),
            max_concurrent_scenarios: 2,
            min_call_interval_ms: 0,
        }
    }

    fn optimizer(judge: ScriptedJudge, threshold: f64, window: usize) -> PromptOptimizer {
        optimizer_with(judge, threshold, settings(window), RetryPolicy::new)
    }

    fn optimizer_with(
        judge: ScriptedJudge,
        threshold: f64,
        settings: OptimizerSettings,
        policy: impl FnOnce(u32, f64, EscalationLadder) -> Result<RetryPolicy, ConfigError>,
    ) -> PromptOptimizer {
        let ladder = EscalationLadder::new(vec![
            PromptVariant::new("base", "Write about {task}.\nKeep it short.", 0),
            PromptVariant::new("strict", "Write plainly about {task}.", 1),
        ])
        .unwrap();
        let evaluator = QualityEvaluator::new(
            Arc::new(RuleSet::compile(vec![]).unwrap()),
            Arc::new(judge),
            2.5,
        )
        .unwrap();
        PromptOptimizer::new(
            Arc::new(ScriptedProvider::echo()),
            evaluator,
            policy(1, threshold, ladder).unwrap(),
            settings,
        )
        .unwrap()
    }

    /// Cancels `token` when asked for the candidate of round `at`.
    struct CancelAt {
        at: u32,
        token: CancellationToken,
    }

    impl MutationStrategy for CancelAt {
        fn name(&self) -> &'static str {
            "cancel-at"
        }

        fn mutate(&self, base: &PromptVariant, round: u32) -> PromptVariant {
            if round == self.at {
                self.token.cancel();
            }
            PromptVariant::new(format!("c{round}"), base.template.clone(), 0)
        }
    }

    fn scenario(id: &str) -> Scenario {
        Scenario::new(id, SessionContext::new("tides"))
    }

    #[tokio::test]
    async fn test_converges_and_skips_remaining_rounds() {
        let opt = optimizer(ScriptedJudge::uniform_sequence(&[3.0, 4.0, 4.0, 4.0]), 0.0, 2);
        let summary = opt
            .run(vec![scenario("s1")], 5, Arc::new(InstructionMutator::default()))
            .await
            .unwrap();

        let s = summary.scenario("s1").unwrap();
        assert!(s.converged);
        assert_eq!(s.rounds_used, 4);
        assert_eq!(s.history.len(), 4);
        assert_eq!(s.baseline_score, Some(3.0));
        assert_eq!(s.final_score, Some(4.0));
        assert_eq!(s.best_score, Some(4.0));
        assert_eq!(s.history[0].candidate_variant.id.as_str(), "base");
        assert!(s.history[1].adopted);
        assert!((s.history[1].improvement_delta - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_runs_full_budget_without_convergence() {
        let opt = optimizer(ScriptedJudge::uniform_sequence(&[3.0, 4.0, 2.0, 4.5, 1.0]), 0.0, 2);
        let summary = opt
            .run(vec![scenario("s1")], 5, Arc::new(InstructionMutator::default()))
            .await
            .unwrap();

        let s = &summary.scenarios[0];
        assert!(!s.converged);
        assert_eq!(s.rounds_used, 5);
        assert_eq!(s.best_score, Some(4.5));
        let adopted: Vec<bool> = s.history.iter().map(|r| r.adopted).collect();
        assert_eq!(adopted, vec![true, true, false, true, false]);
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let opt = optimizer(ScriptedJudge::uniform_sequence(&[3.0, 4.0, 4.0, 4.0]), 0.0, 2);
        let mut rx = opt.subscribe();
        opt.run(vec![scenario("s1")], 5, Arc::new(InstructionMutator::default()))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let completed = events
            .iter()
            .filter(|e| matches!(e, OptimizerEvent::RoundCompleted { .. }))
            .count();
        assert_eq!(completed, 4);
        assert!(events.iter().any(|e| matches!(
            e,
            OptimizerEvent::ScenarioConverged { round_number: 4, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            OptimizerEvent::RoundSkipped { round_number: 5, .. }
        )));
        assert!(matches!(
            events.last(),
            Some(OptimizerEvent::ScenarioFinished { rounds_used: 4, converged: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_equal_scores_prefer_shorter_template() {
        let opt = optimizer(ScriptedJudge::constant(DimensionScore::uniform(4.0)), 0.0, 5);
        // Mutator that drops the last instruction every round.
        struct Shorten;
        impl MutationStrategy for Shorten {
            fn name(&self) -> &'static str {
                "shorten"
            }
            fn mutate(&self, base: &PromptVariant, round: u32) -> PromptVariant {
                let lines: Vec<&str> = base.instructions().collect();
                let keep = lines.len().saturating_sub(1).max(1);
                PromptVariant::new(format!("short{round}"), lines[..keep].join("\n"), 0)
            }
        }

        let summary = opt.run(vec![scenario("s1")], 2, Arc::new(Shorten)).await.unwrap();
        let s = &summary.scenarios[0];
        assert!(s.history[1].adopted);
        assert_eq!(s.best_variant.id.as_str(), "short2");
        assert_eq!(s.best_variant.instruction_count(), 1);
    }

    #[tokio::test]
    async fn test_pacing_does_not_eat_generation_timeout() {
        let settings = OptimizerSettings {
            min_call_interval_ms: 120,
            ..settings(5)
        };
        let opt = optimizer_with(
            ScriptedJudge::constant(DimensionScore::uniform(5.0)),
            4.0,
            settings,
            |attempts, threshold, ladder| {
                Ok(RetryPolicy::new(attempts, threshold, ladder)?.with_generation_timeout_ms(30))
            },
        );
        let summary = opt
            .run(vec![scenario("s1")], 3, Arc::new(InstructionMutator::default()))
            .await
            .unwrap();

        let s = &summary.scenarios[0];
        assert!(s.incomplete_rounds.is_empty());
        assert_eq!(s.history.len(), 3);
        assert!(s
            .history
            .iter()
            .all(|r| r.session_outcome == SessionOutcome::Accepted));
    }

    #[tokio::test]
    async fn test_cancel_reports_completed_rounds() {
        let opt = optimizer(ScriptedJudge::uniform_sequence(&[3.0, 3.5, 4.0]), 0.0, 5);
        let mut rx = opt.subscribe();
        let cancel = CancellationToken::new();
        let mutation = Arc::new(CancelAt {
            at: 3,
            token: cancel.clone(),
        });

        let summary = opt
            .run_with_cancel(vec![scenario("s1")], 5, mutation, cancel)
            .await
            .unwrap();

        let s = &summary.scenarios[0];
        assert_eq!(s.rounds_used, 2);
        assert_eq!(s.history.len(), 2);
        assert!(s.incomplete_rounds.is_empty());
        assert!(!s.converged);
        assert_eq!(s.best_score, Some(3.5));

        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            if let OptimizerEvent::ScenarioFinished { rounds_used, .. } = event {
                finished = Some(rounds_used);
            }
        }
        assert_eq!(finished, Some(2));
    }

    #[tokio::test]
    async fn test_cancel_before_start_runs_nothing() {
        let opt = optimizer(ScriptedJudge::constant(DimensionScore::uniform(4.0)), 0.0, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = opt
            .run_with_cancel(
                vec![scenario("a"), scenario("b")],
                3,
                Arc::new(InstructionMutator::default()),
                cancel,
            )
            .await
            .unwrap();

        assert!(summary
            .scenarios
            .iter()
            .all(|s| s.rounds_used == 0 && s.history.is_empty() && s.baseline_score.is_none()));
    }

    #[tokio::test]
    async fn test_rejects_zero_rounds_and_duplicate_ids() {
        let opt = optimizer(ScriptedJudge::constant(DimensionScore::uniform(4.0)), 0.0, 2);
        let mutation: Arc<dyn MutationStrategy> = Arc::new(InstructionMutator::default());
        assert!(opt.run(vec![scenario("a")], 0, mutation.clone()).await.is_err());
        assert!(opt
            .run(vec![scenario("a"), scenario("a")], 2, mutation)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_panicking_round_is_skipped() {
        struct Bomb;
        impl MutationStrategy for Bomb {
            fn name(&self) -> &'static str {
                "bomb"
            }
            fn mutate(&self, base: &PromptVariant, round: u32) -> PromptVariant {
                PromptVariant::new(format!("b{round}"), format!("{}\nPANIC", base.template), 0)
            }
        }
        struct PanicOnMarker;
        #[async_trait::async_trait]
        impl crate::domain::ports::RubricJudge for PanicOnMarker {
            fn name(&self) -> &'static str {
                "panic"
            }
            async fn score(&self, text: &str) -> Result<DimensionScore, crate::domain::JudgeError> {
                assert!(!text.contains("PANIC"), "judge exploded");
                Ok(DimensionScore::uniform(4.0))
            }
        }

        let ladder = EscalationLadder::new(vec![PromptVariant::new("base", "Write.", 0)]).unwrap();
        let evaluator = QualityEvaluator::new(
            Arc::new(RuleSet::compile(vec![]).unwrap()),
            Arc::new(PanicOnMarker),
            2.5,
        )
        .unwrap();
        let opt = PromptOptimizer::new(
            Arc::new(ScriptedProvider::echo()),
            evaluator,
            RetryPolicy::new(1, 0.0, ladder).unwrap(),
            settings(2),
        )
        .unwrap();

        let summary = opt.run(vec![scenario("s1")], 3, Arc::new(Bomb)).await.unwrap();
        let s = &summary.scenarios[0];
        assert_eq!(s.incomplete_rounds, vec![2, 3]);
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.rounds_used, 3);
        assert_eq!(s.history[0].session_outcome, SessionOutcome::Accepted);
    }
}
