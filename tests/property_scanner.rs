mod common;

use proptest::prelude::*;
use std::collections::HashSet;

use scrivener::domain::models::{DimensionScore, QualityVerdict};
use scrivener::services::{RuleSet, ViolationScanner};

const VOCABULARY: &[&str] = &[
    "arguably",
    "Arguably,",
    "widgets",
    "game changer",
    "basically",
    "the",
    "As an AI language model",
    "naïve",
    "argue",
    "\n",
];

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCABULARY), 0..40).prop_map(|words| words.join(" "))
}

fn rules() -> RuleSet {
    RuleSet::from_specs(common::default_rules()).unwrap()
}

proptest! {
    /// Property: scanning is a pure function of the text and the rules
    #[test]
    fn prop_scan_is_deterministic(text in text_strategy()) {
        let rules = rules();
        prop_assert_eq!(
            ViolationScanner::scan(&text, &rules),
            ViolationScanner::scan(&text, &rules)
        );
    }

    /// Property: every violation points at the exact text it reports
    #[test]
    fn prop_spans_match_text(text in text_strategy()) {
        for v in ViolationScanner::scan(&text, &rules()) {
            prop_assert!(v.span.end <= text.len());
            prop_assert!(!v.span.is_empty());
            prop_assert_eq!(&text[v.span.start..v.span.end], v.matched_text.as_str());
        }
    }

    /// Property: a span is reported at most once
    #[test]
    fn prop_no_duplicate_spans(text in text_strategy()) {
        let violations = ViolationScanner::scan(&text, &rules());
        let spans: HashSet<_> = violations.iter().map(|v| v.span).collect();
        prop_assert_eq!(spans.len(), violations.len());
    }

    /// Property: a critical violation fails every threshold, and the composite stays in range
    #[test]
    fn prop_critical_blocks_acceptance(
        text in text_strategy(),
        score in 0.0f64..=5.0,
        threshold in 0.0f64..=5.0,
    ) {
        let violations = ViolationScanner::scan(&text, &rules());
        let verdict = QualityVerdict::compose(DimensionScore::uniform(score), violations);

        prop_assert!((0.0..=5.0).contains(&verdict.composite));
        prop_assert!(verdict.composite <= score + 1e-12);
        if verdict.critical_count > 0 {
            prop_assert!(!verdict.is_acceptable(threshold));
        }
    }
}
