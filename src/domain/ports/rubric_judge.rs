//! Rubric judge port - external scoring of the four quality dimensions.

use async_trait::async_trait;

use crate::domain::errors::JudgeError;
use crate::domain::models::DimensionScore;

/// Scores text on clarity, depth, nuance and specificity.
///
/// Any error degrades the verdict instead of failing the attempt, so callers
/// must not retry inside an implementation.
#[async_trait]
pub trait RubricJudge: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(&self, text: &str) -> Result<DimensionScore, JudgeError>;
}
