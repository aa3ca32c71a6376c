//! Scrivener - quality-gated text generation and prompt tuning
//!
//! Scrivener scores generated text against a rubric and a configurable set of
//! violation rules, retries with escalating prompt variants until a draft is
//! good enough, and tunes the base variant offline by replaying scenarios.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Scanning, evaluation, the retry loop and the optimizer
//! - **Adapters** (`adapters`): Generation providers and rubric judges
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging and file loaders
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scrivener::{Config, SessionContext, SessionGroup};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let group = SessionGroup::new(rules, variants, &Config::default())?;
//!     let orchestrator = group.orchestrator(provider, judge)?;
//!     let session = orchestrator.run(SessionContext::new("Introduce the library")).await;
//!     println!("{:?}", session.final_text());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, DimensionScore, GenerationAttempt, GenerationSession, OptimizationSummary,
    OptimizerEvent, PromptLibrary, PromptVariant, QualityVerdict, RetryPolicy, Rule, RuleSpec,
    Scenario, SessionContext, SessionOutcome, Severity, Violation,
};
pub use domain::{ConfigError, JudgeError, ProviderError};
pub use infrastructure::config::ConfigLoader;
pub use services::{
    InstructionMutator, PromptOptimizer, QualityEvaluator, RetryOrchestrator, RuleSet,
    SessionGroup, ViolationScanner,
};
