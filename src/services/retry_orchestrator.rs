//! Retry orchestrator: one generation session as an explicit state machine.
//!
//! ```text
//! INIT -> GENERATING -> EVALUATING -> ACCEPTED
//!              |              \-> RETRYING -> GENERATING
//!              \-> RETRYING   \-> EXHAUSTED
//! ```
//!
//! Per-attempt failures never escape [`RetryOrchestrator::run`]; they are
//! recorded in the attempt history. Only construction can fail, with a
//! [`ConfigError`].

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{ConfigError, ProviderError};
use crate::domain::models::{
    AttemptOutcome, ExhaustionReason, GenerationAttempt, GenerationSession, PromptVariant,
    RetryPolicy, SessionContext, SessionOutcome, Violation,
};
use crate::domain::ports::GenerationProvider;
use crate::services::call_pacer::CallPacer;
use crate::services::quality_evaluator::QualityEvaluator;

/// Marks a template line the mutation strategy must leave alone.
pub const PROTECTED_PREFIX: char = '!';

/// States of a generation session.
#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    Init,
    Generating,
    Evaluating { text: String },
    Retrying,
    Accepted,
    Exhausted(ExhaustionReason),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Generating => "GENERATING",
            Self::Evaluating { .. } => "EVALUATING",
            Self::Retrying => "RETRYING",
            Self::Accepted => "ACCEPTED",
            Self::Exhausted(_) => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Drives generation sessions against one provider, evaluator and policy.
#[derive(Clone)]
pub struct RetryOrchestrator {
    provider: Arc<dyn GenerationProvider>,
    evaluator: QualityEvaluator,
    policy: RetryPolicy,
    pacer: Option<CallPacer>,
}

impl RetryOrchestrator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        evaluator: QualityEvaluator,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        let evaluator = match policy.judge_timeout_ms {
            Some(ms) => evaluator.with_judge_timeout(Duration::from_millis(ms)),
            None => evaluator,
        };

        Ok(Self {
            provider,
            evaluator,
            policy,
            pacer: None,
        })
    }

    /// Wait on `pacer` before every provider call. The wait happens before the
    /// generation timeout starts, so queueing never counts as provider latency.
    pub fn with_pacer(mut self, pacer: CallPacer) -> Self {
        self.pacer = pacer.is_enabled().then_some(pacer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same collaborators, different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            pacer: self.pacer.clone(),
            ..Self::new(self.provider.clone(), self.evaluator.clone(), policy)?
        })
    }

    /// Run a session to completion.
    pub async fn run(&self, context: SessionContext) -> GenerationSession {
        self.run_with_cancel(context, &CancellationToken::new()).await
    }

    /// Run a session, honouring `cancel` between attempts.
    ///
    /// A cancelled session ends `EXHAUSTED` with the attempts made so far.
    #[tracing::instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn run_with_cancel(
        &self,
        context: SessionContext,
        cancel: &CancellationToken,
    ) -> GenerationSession {
        let id = Uuid::new_v4();
        tracing::Span::current().record("session_id", tracing::field::display(id));
        let started_at = Utc::now();

        let ladder = &self.policy.escalation_ladder;
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut rung = 0usize;
        let mut attempt_number = 0u32;
        let mut consecutive_failures = 0u32;
        let mut feedback: Vec<Violation> = Vec::new();
        let mut state = SessionState::Init;

        loop {
            state = match state {
                SessionState::Init => SessionState::Generating,

                SessionState::Generating => {
                    if cancel.is_cancelled() || !self.pace(cancel).await {
                        tracing::info!(attempts = attempts.len(), "Session cancelled");
                        SessionState::Exhausted(ExhaustionReason::Cancelled)
                    } else {
                        attempt_number += 1;
                        let variant = ladder.rung(rung);
                        let prompt = render_prompt(variant, &context, &feedback);

                        match self.generate(&prompt, &context).await {
                            Ok(text) => {
                                consecutive_failures = 0;
                                SessionState::Evaluating { text }
                            }
                            Err(err) => {
                                consecutive_failures += 1;
                                let outcome = if err.is_timeout() {
                                    AttemptOutcome::TimedOut
                                } else {
                                    AttemptOutcome::ProviderError
                                };
                                tracing::warn!(
                                    attempt = attempt_number,
                                    tier = variant.tier,
                                    outcome = outcome.as_str(),
                                    error = %err,
                                    "Provider call failed"
                                );
                                attempts.push(GenerationAttempt {
                                    attempt_number,
                                    prompt_variant: variant.id.clone(),
                                    tier: variant.tier,
                                    generated_text: String::new(),
                                    verdict: None,
                                    outcome,
                                    error: Some(err.to_string()),
                                    timestamp: Utc::now(),
                                });

                                if consecutive_failures >= self.policy.max_consecutive_provider_errors {
                                    SessionState::Exhausted(
                                        ExhaustionReason::ConsecutiveProviderErrors,
                                    )
                                } else if attempt_number >= self.policy.max_attempts {
                                    SessionState::Exhausted(ExhaustionReason::AttemptsSpent)
                                } else {
                                    SessionState::Retrying
                                }
                            }
                        }
                    }
                }

                SessionState::Evaluating { text } => {
                    let variant = ladder.rung(rung);
                    let verdict = self.evaluator.evaluate(&text).await;
                    let accepted = verdict.is_acceptable(self.policy.acceptance_threshold);
                    let outcome = if accepted {
                        AttemptOutcome::Accepted
                    } else {
                        AttemptOutcome::Retried
                    };

                    tracing::info!(
                        attempt = attempt_number,
                        tier = variant.tier,
                        composite = verdict.composite,
                        critical = verdict.critical_count,
                        degraded = verdict.degraded,
                        outcome = outcome.as_str(),
                        "Attempt evaluated"
                    );

                    feedback = verdict.penalized_violations().cloned().collect();
                    attempts.push(GenerationAttempt {
                        attempt_number,
                        prompt_variant: variant.id.clone(),
                        tier: variant.tier,
                        generated_text: text,
                        verdict: Some(verdict),
                        outcome,
                        error: None,
                        timestamp: Utc::now(),
                    });

                    if accepted {
                        SessionState::Accepted
                    } else if attempt_number < self.policy.max_attempts {
                        SessionState::Retrying
                    } else {
                        SessionState::Exhausted(ExhaustionReason::AttemptsSpent)
                    }
                }

                SessionState::Retrying => {
                    rung = (rung + 1).min(ladder.top_index());
                    SessionState::Generating
                }

                terminal @ (SessionState::Accepted | SessionState::Exhausted(_)) => {
                    return self.finish(id, context, attempts, &terminal, started_at);
                }
            };
        }
    }

    /// Wait for a pacing slot. `false` when cancelled while queued.
    async fn pace(&self, cancel: &CancellationToken) -> bool {
        let Some(pacer) = &self.pacer else {
            return true;
        };
        tokio::select! {
            () = cancel.cancelled() => false,
            () = pacer.wait() => true,
        }
    }

    async fn generate(&self, prompt: &str, context: &SessionContext) -> Result<String, ProviderError> {
        match self.policy.generation_timeout_ms {
            Some(ms) => tokio::time::timeout(
                Duration::from_millis(ms),
                self.provider.generate(prompt, context),
            )
            .await
            .map_err(|_| ProviderError::Timeout { after_ms: ms })?,
            None => self.provider.generate(prompt, context).await,
        }
    }

    fn finish(
        &self,
        id: Uuid,
        context: SessionContext,
        attempts: Vec<GenerationAttempt>,
        terminal: &SessionState,
        started_at: chrono::DateTime<Utc>,
    ) -> GenerationSession {
        let (outcome, exhaustion_reason) = match terminal {
            SessionState::Exhausted(reason) => (SessionOutcome::Exhausted, Some(*reason)),
            _ => (SessionOutcome::Accepted, None),
        };

        let session = GenerationSession {
            id,
            context,
            policy: self.policy.clone(),
            attempts,
            outcome,
            exhaustion_reason,
            started_at,
            finished_at: Utc::now(),
        };

        match session.exhaustion_reason {
            None => tracing::info!(
                state = %terminal,
                attempts = session.attempts.len(),
                composite = session.best_composite(),
                "Session accepted"
            ),
            Some(reason) => tracing::warn!(
                state = %terminal,
                reason = %reason,
                attempts = session.attempts.len(),
                composite = session.best_composite(),
                "Session exhausted, returning best attempt"
            ),
        }

        session
    }
}

/// Render a variant template for one attempt.
///
/// `{task}`, `{excerpts}` and `{feedback}` are substituted in place; any that
/// the template omits are appended as labelled sections when non-empty.
/// Protected-line markers are stripped.
pub fn render_prompt(
    variant: &PromptVariant,
    context: &SessionContext,
    feedback: &[Violation],
) -> String {
    let template: String = variant
        .template
        .lines()
        .map(|line| {
            line.trim_start()
                .strip_prefix(PROTECTED_PREFIX)
                .map_or(line, str::trim_start)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let excerpts = context
        .excerpts
        .iter()
        .map(|e| format!("- {}", e.text.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let feedback = feedback
        .iter()
        .map(|v| format!("- [{}] {}: \"{}\"", v.severity, v.category, v.matched_text))
        .collect::<Vec<_>>()
        .join("\n");

    let sections = [
        ("{task}", "Task", context.task.trim()),
        ("{excerpts}", "Reference excerpts", excerpts.as_str()),
        (
            "{feedback}",
            "The previous draft was rejected for these issues; do not repeat them",
            feedback.as_str(),
        ),
    ];

    // One pass over the template, so substituted values are never rescanned.
    let mut prompt = String::with_capacity(template.len());
    let mut used = [false; 3];
    let mut rest = template.as_str();
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];
        match sections.iter().position(|(placeholder, _, _)| tail.starts_with(placeholder)) {
            Some(index) => {
                let (placeholder, _, value) = sections[index];
                prompt.push_str(value);
                used[index] = true;
                rest = &tail[placeholder.len()..];
            }
            None => {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
    }
    prompt.push_str(rest);

    let appended: Vec<String> = sections
        .iter()
        .zip(used)
        .filter(|((_, _, value), used)| !used && !value.is_empty())
        .map(|((_, label, value), _)| format!("{label}:\n{value}"))
        .collect();

    if !appended.is_empty() {
        prompt = format!("{}\n\n{}", prompt.trim_end(), appended.join("\n\n"));
    }
    prompt
}
