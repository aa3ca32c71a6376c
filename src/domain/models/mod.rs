pub mod config;
pub mod optimization;
pub mod rule;
pub mod score;
pub mod session;
pub mod variant;
pub mod violation;

pub use config::{
    Config, EvaluatorConfig, JudgeConfig, LogFormat, LoggingConfig, OptimizerConfig,
    ProviderConfig, ProviderKind, RetryConfig, RotationPolicy,
};
pub use optimization::{
    OptimizationRound, OptimizationSummary, OptimizerEvent, Scenario, ScenarioSummary,
};
pub use rule::{MatchKind, Rule, RuleSpec};
pub use score::{DimensionScore, QualityVerdict, SeverityCounts, MAX_PENALTY, MAX_SCORE};
pub use session::{
    AttemptOutcome, Excerpt, ExhaustionReason, GenerationAttempt, GenerationSession,
    RetryPolicy, SessionContext, SessionOutcome,
};
pub use variant::{EscalationLadder, PromptLibrary, PromptVariant, VariantId};
pub use violation::{Severity, Span, Violation, ViolationCategory};
