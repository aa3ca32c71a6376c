//! Service layer: scanning, evaluation, the retry state machine and the
//! prompt optimizer.

pub mod call_pacer;
pub mod convergence;
pub mod mutation;
pub mod prompt_optimizer;
pub mod quality_evaluator;
pub mod retry_orchestrator;
pub mod session_group;
pub mod violation_scanner;

pub use call_pacer::CallPacer;
pub use convergence::{ConvergenceCheck, ConvergencePolicy, ConvergenceTracker};
pub use mutation::{InstructionMutator, MutationOp};
pub use prompt_optimizer::{OptimizerSettings, PromptOptimizer};
pub use quality_evaluator::QualityEvaluator;
pub use retry_orchestrator::{render_prompt, RetryOrchestrator, PROTECTED_PREFIX};
pub use session_group::SessionGroup;
pub use violation_scanner::{RuleSet, ViolationScanner};
