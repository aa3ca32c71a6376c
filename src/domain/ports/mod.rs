//! Port trait definitions (Hexagonal Architecture)
//!
//! - GenerationProvider: produces text for a rendered prompt
//! - RubricJudge: scores text on the four rubric dimensions
//! - MutationStrategy: derives candidate prompt variants for the optimizer

pub mod generation_provider;
pub mod mutation;
pub mod rubric_judge;

pub use generation_provider::GenerationProvider;
pub use mutation::MutationStrategy;
pub use rubric_judge::RubricJudge;
