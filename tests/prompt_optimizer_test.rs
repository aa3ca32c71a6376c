//! Optimizer runs wired through a session group, as the CLI builds them.

mod common;

use std::sync::Arc;

use scrivener::adapters::judges::ScriptedJudge;
use scrivener::adapters::providers::ScriptedProvider;
use scrivener::domain::models::{
    DimensionScore, OptimizerEvent, Scenario, SessionContext, SessionOutcome,
};
use scrivener::services::InstructionMutator;

use common::{config, group};

fn scenarios(ids: &[&str]) -> Vec<Scenario> {
    ids.iter()
        .map(|id| Scenario::new(*id, SessionContext::new(format!("topic {id}"))))
        .collect()
}

#[tokio::test]
async fn test_converges_within_budget() {
    let mut cfg = config(1, 0.0);
    cfg.optimizer.convergence_window = 2;
    cfg.optimizer.convergence_epsilon = 0.01;
    cfg.optimizer.stable_checks_required = 2;
    let optimizer = group(&cfg)
        .optimizer(
            Arc::new(ScriptedProvider::echo()),
            Arc::new(ScriptedJudge::uniform_sequence(&[3.0, 4.0, 4.0, 4.0])),
        )
        .unwrap();

    let mut events = optimizer.subscribe();
    let summary = optimizer
        .run(scenarios(&["s1"]), 5, Arc::new(InstructionMutator::from_config(&cfg.optimizer)))
        .await
        .unwrap();

    let s = summary.scenario("s1").unwrap();
    assert!(s.converged);
    assert_eq!(s.rounds_used, 4);
    assert_eq!(s.baseline_score, Some(3.0));
    assert_eq!(s.best_score, Some(4.0));
    assert_eq!(summary.rounds_budget, 5);
    assert_eq!(summary.converged_count(), 1);

    let mut skipped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let OptimizerEvent::RoundSkipped { round_number, .. } = event {
            skipped.push(round_number);
        }
    }
    assert_eq!(skipped, vec![5]);
}

#[tokio::test]
async fn test_scenarios_are_isolated_and_ordered() {
    let mut cfg = config(1, 0.0);
    cfg.optimizer.max_concurrent_scenarios = 3;
    let judge = ScriptedJudge::keyed(
        [("topic good", DimensionScore::uniform(4.5))],
        DimensionScore::uniform(2.0),
    );
    let optimizer = group(&cfg)
        .optimizer(Arc::new(ScriptedProvider::echo()), Arc::new(judge))
        .unwrap();

    let summary = optimizer
        .run(scenarios(&["good", "plain", "other"]), 3, Arc::new(InstructionMutator::default()))
        .await
        .unwrap();

    let ids: Vec<&str> = summary.scenarios.iter().map(|s| s.scenario_id.as_str()).collect();
    assert_eq!(ids, vec!["good", "plain", "other"]);
    assert_eq!(summary.scenario("good").unwrap().best_score, Some(4.5));
    assert_eq!(summary.scenario("plain").unwrap().best_score, Some(2.0));
}

#[tokio::test]
async fn test_rounds_reuse_the_acceptance_gate() {
    let cfg = config(1, 4.0);
    let optimizer = group(&cfg)
        .optimizer(
            Arc::new(ScriptedProvider::echo()),
            Arc::new(ScriptedJudge::uniform_sequence(&[3.0, 4.5])),
        )
        .unwrap();

    let summary = optimizer
        .run(scenarios(&["s1"]), 2, Arc::new(InstructionMutator::default()))
        .await
        .unwrap();

    let history = &summary.scenarios[0].history;
    assert_eq!(history[0].session_outcome, SessionOutcome::Exhausted);
    assert_eq!(history[1].session_outcome, SessionOutcome::Accepted);
    assert!(history[1].adopted);
    assert_eq!(summary.scenarios[0].best_variant.id.as_str(), "default~r2");
}

#[tokio::test]
async fn test_best_variant_keeps_protected_lines() {
    let mut cfg = config(1, 0.0);
    cfg.retry.escalation_ladder = vec!["strict".to_string()];
    let mut strict = common::ladder_variants().remove(2);
    strict.tier = 0;
    let group = scrivener::services::SessionGroup::new(common::default_rules(), vec![strict], &cfg)
        .unwrap();
    let optimizer = group
        .optimizer(
            Arc::new(ScriptedProvider::echo()),
            Arc::new(ScriptedJudge::uniform_sequence(&[3.0, 3.5, 4.0, 4.5, 5.0])),
        )
        .unwrap();

    let summary = optimizer
        .run(scenarios(&["s1"]), 5, Arc::new(InstructionMutator::default()))
        .await
        .unwrap();

    for round in &summary.scenarios[0].history {
        assert!(round.candidate_variant.template.starts_with("!Never invent facts."));
    }
}
