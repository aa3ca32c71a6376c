//! Scripted generation provider for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::ProviderError;
use crate::domain::models::SessionContext;
use crate::domain::ports::GenerationProvider;

/// How the provider answers once its script has been consumed.
#[derive(Debug, Clone)]
enum Fallback {
    /// Repeat the last scripted reply.
    RepeatLast,
    /// Return the rendered prompt verbatim.
    Echo,
}

/// Replays a fixed sequence of replies in call order.
///
/// Every prompt it receives is recorded so tests can assert on rendering.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Option<Result<String, ProviderError>>>,
    fallback: Fallback,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fallback: Fallback::RepeatLast,
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Successful replies only.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Always answer with the prompt itself.
    pub fn echo() -> Self {
        Self {
            fallback: Fallback::Echo,
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before answering; used to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &str,
        _context: &SessionContext,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().await.push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().await.pop_front();
        match next {
            Some(reply) => {
                *self.last.lock().await = Some(reply.clone());
                reply
            }
            None => match self.fallback {
                Fallback::Echo => Ok(prompt.to_string()),
                Fallback::RepeatLast => self.last.lock().await.clone().unwrap_or_else(|| {
                    Err(ProviderError::Failed("script is empty".to_string()))
                }),
            },
        }
    }
}
