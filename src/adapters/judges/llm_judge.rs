//! LLM rubric judge.
//!
//! Asks a model to score text on the four rubric dimensions and return a
//! single JSON object. Anything short of four finite numbers in `[0, 5]` is a
//! malformed response.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::providers::anthropic::AnthropicClient;
use crate::domain::errors::{JudgeError, ProviderError};
use crate::domain::models::DimensionScore;
use crate::domain::ports::RubricJudge;

const RUBRIC_PROMPT: &str = "You grade prose on four dimensions, each from 0 to 5.\n\
clarity: is every sentence easy to follow?\n\
depth: does it go beyond surface-level statements?\n\
nuance: does it acknowledge real trade-offs without hedging?\n\
specificity: does it use concrete facts, names and numbers?\n\
Reply with one JSON object and nothing else, for example:\n\
{\"clarity\": 4, \"depth\": 3.5, \"nuance\": 3, \"specificity\": 4}";

const DIMENSIONS: [&str; 4] = ["clarity", "depth", "nuance", "specificity"];

/// Rubric judge backed by the Anthropic Messages API.
pub struct LlmJudge {
    client: Arc<AnthropicClient>,
    model: String,
}

impl LlmJudge {
    /// `model` overrides the client's generation model when set.
    pub fn new(client: Arc<AnthropicClient>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| client.config().model.clone());
        Self { client, model }
    }

    /// Parse a judge reply into dimension scores.
    pub fn parse_response(response: &str) -> Result<DimensionScore, JudgeError> {
        let json = extract_json(response)
            .ok_or_else(|| JudgeError::Malformed("no JSON object in response".to_string()))?;

        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| JudgeError::Malformed(format!("invalid JSON: {e}")))?;

        let mut scores = [0.0_f64; 4];
        for (slot, key) in scores.iter_mut().zip(DIMENSIONS) {
            *slot = value
                .get(key)
                .ok_or_else(|| JudgeError::Malformed(format!("missing `{key}`")))?
                .as_f64()
                .ok_or_else(|| JudgeError::Malformed(format!("`{key}` is not a number")))?;
        }

        DimensionScore::try_new(scores[0], scores[1], scores[2], scores[3])
            .map_err(JudgeError::Malformed)
    }
}

/// Slice from the first `{` to the last `}`, tolerating prose or code fences.
fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

#[async_trait]
impl RubricJudge for LlmJudge {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn score(&self, text: &str) -> Result<DimensionScore, JudgeError> {
        let reply = self
            .client
            .complete(&self.model, Some(RUBRIC_PROMPT), text)
            .await
            .map_err(|e| match e {
                ProviderError::Timeout { after_ms } => JudgeError::Timeout { after_ms },
                ProviderError::Failed(msg) => JudgeError::Failed(msg),
            })?;

        Self::parse_response(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_object() {
        let scores = LlmJudge::parse_response(
            r#"{"clarity": 4, "depth": 3.5, "nuance": 3, "specificity": 4.5}"#,
        )
        .unwrap();
        assert!((scores.mean() - 3.75).abs() < 1e-9);
    }

    #[test]
    fn test_parses_object_inside_prose() {
        let reply = "Here you go:\n```json\n{\"clarity\": 5, \"depth\": 5, \"nuance\": 5, \"specificity\": 5}\n```";
        assert!(LlmJudge::parse_response(reply).is_ok());
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let err = LlmJudge::parse_response(r#"{"clarity": 4, "depth": 3, "specificity": 4}"#)
            .unwrap_err();
        assert_eq!(err, JudgeError::Malformed("missing `nuance`".to_string()));
    }

    #[test]
    fn test_non_numeric_is_malformed() {
        let err = LlmJudge::parse_response(
            r#"{"clarity": "high", "depth": 3, "nuance": 3, "specificity": 4}"#,
        )
        .unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(_)));
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let err = LlmJudge::parse_response(
            r#"{"clarity": 9, "depth": 3, "nuance": 3, "specificity": 4}"#,
        )
        .unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(_)));
    }

    #[test]
    fn test_no_json_is_malformed() {
        assert!(LlmJudge::parse_response("I'd give it a four.").is_err());
    }
}
