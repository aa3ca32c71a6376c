//! Mutation strategy port used by the prompt optimizer.

use crate::domain::models::PromptVariant;

/// Derives a candidate variant from the current best one.
///
/// Mutations only touch template wording. The zero-critical acceptance gate is
/// enforced by the evaluator and cannot be reached from here.
pub trait MutationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce the candidate for `round` (2 or later). Must be deterministic for
    /// a given `(base, round)` pair.
    fn mutate(&self, base: &PromptVariant, round: u32) -> PromptVariant;
}
