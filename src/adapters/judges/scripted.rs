//! Scripted rubric judge for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::JudgeError;
use crate::domain::models::DimensionScore;
use crate::domain::ports::RubricJudge;

enum Mode {
    /// Replay results in call order, repeating the last one.
    Sequence {
        script: Mutex<VecDeque<Result<DimensionScore, JudgeError>>>,
        last: Mutex<Option<Result<DimensionScore, JudgeError>>>,
    },
    /// Score by the first marker the text contains.
    Keyed {
        markers: Vec<(String, DimensionScore)>,
        default: DimensionScore,
    },
}

/// Deterministic stand-in for an LLM judge.
pub struct ScriptedJudge {
    mode: Mode,
    delay: Option<Duration>,
}

impl ScriptedJudge {
    pub fn new(script: Vec<Result<DimensionScore, JudgeError>>) -> Self {
        Self {
            mode: Mode::Sequence {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
            },
            delay: None,
        }
    }

    pub fn constant(score: DimensionScore) -> Self {
        Self::new(vec![Ok(score)])
    }

    /// Uniform composites in call order, e.g. `[3.0, 4.0, 4.0]`.
    pub fn uniform_sequence(values: &[f64]) -> Self {
        Self::new(
            values
                .iter()
                .map(|v| Ok(DimensionScore::uniform(*v)))
                .collect(),
        )
    }

    /// Score text by substring markers; the first matching marker wins.
    pub fn keyed<I, S>(markers: I, default: DimensionScore) -> Self
    where
        I: IntoIterator<Item = (S, DimensionScore)>,
        S: Into<String>,
    {
        Self {
            mode: Mode::Keyed {
                markers: markers.into_iter().map(|(m, s)| (m.into(), s)).collect(),
                default,
            },
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl RubricJudge for ScriptedJudge {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn score(&self, text: &str) -> Result<DimensionScore, JudgeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.mode {
            Mode::Sequence { script, last } => {
                let next = script.lock().await.pop_front();
                match next {
                    Some(result) => {
                        *last.lock().await = Some(result.clone());
                        result
                    }
                    None => last.lock().await.clone().unwrap_or_else(|| {
                        Err(JudgeError::Failed("script is empty".to_string()))
                    }),
                }
            }
            Mode::Keyed { markers, default } => Ok(markers
                .iter()
                .find(|(marker, _)| text.contains(marker.as_str()))
                .map_or(*default, |(_, score)| *score)),
        }
    }
}
