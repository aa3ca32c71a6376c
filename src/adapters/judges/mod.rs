//! Rubric judge adapters.

pub mod llm_judge;
pub mod scripted;

pub use llm_judge::LlmJudge;
pub use scripted::ScriptedJudge;
