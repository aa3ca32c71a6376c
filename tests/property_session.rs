mod common;

use proptest::prelude::*;

use scrivener::domain::models::{AttemptOutcome, GenerationSession, SessionContext, SessionOutcome};

fn run_session(scores: &[f64], replies: &[&str], max_attempts: u32, threshold: f64) -> GenerationSession {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let group = common::group(&common::config(max_attempts, threshold));
        let orchestrator = group
            .orchestrator(common::provider(replies), common::judge(scores))
            .unwrap();
        orchestrator.run(SessionContext::new("widgets")).await
    })
}

fn reply_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(
        prop::sample::select(&[
            "Widgets cut costs by 40%.",
            "Arguably, widgets help.",
            "As an AI language model, I like widgets.",
            "This is basically a game changer.",
        ][..]),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: attempt numbers are 1..=n with no gaps, and tiers never go down
    #[test]
    fn prop_attempts_are_contiguous_and_escalate(
        scores in prop::collection::vec(0.0f64..=5.0, 1..6),
        replies in reply_strategy(),
        max_attempts in 1u32..6,
        threshold in 0.0f64..=5.0,
    ) {
        let session = run_session(&scores, &replies, max_attempts, threshold);

        prop_assert!(!session.attempts.is_empty());
        prop_assert!(session.attempts.len() <= max_attempts as usize);
        for (i, attempt) in session.attempts.iter().enumerate() {
            prop_assert_eq!(attempt.attempt_number, i as u32 + 1);
        }
        for pair in session.attempts.windows(2) {
            prop_assert!(pair[0].tier <= pair[1].tier);
        }
    }

    /// Property: only the last attempt can be accepted, and acceptance is never
    /// granted to a draft with a critical violation
    #[test]
    fn prop_acceptance_is_terminal_and_gated(
        scores in prop::collection::vec(0.0f64..=5.0, 1..6),
        replies in reply_strategy(),
        max_attempts in 1u32..6,
        threshold in 0.0f64..=5.0,
    ) {
        let session = run_session(&scores, &replies, max_attempts, threshold);
        let last = session.attempts.len() - 1;

        for (i, attempt) in session.attempts.iter().enumerate() {
            if attempt.outcome == AttemptOutcome::Accepted {
                prop_assert_eq!(i, last);
                let verdict = attempt.verdict.as_ref().unwrap();
                prop_assert_eq!(verdict.critical_count, 0);
                prop_assert!(verdict.composite >= threshold);
            }
        }
        prop_assert_eq!(
            session.outcome == SessionOutcome::Accepted,
            session.attempts[last].outcome == AttemptOutcome::Accepted
        );
    }

    /// Property: an exhausted session surfaces its highest-scoring attempt
    #[test]
    fn prop_exhausted_returns_best(
        scores in prop::collection::vec(0.0f64..=5.0, 1..6),
        max_attempts in 1u32..6,
    ) {
        let session = run_session(&scores, &["Widgets cut costs by 40%."], max_attempts, 5.0);
        if session.outcome == SessionOutcome::Exhausted {
            let best = session
                .attempts
                .iter()
                .filter_map(|a| a.composite())
                .fold(f64::MIN, f64::max);
            prop_assert_eq!(session.best_composite(), Some(best));
        }
    }
}
