//! `scrivener generate`: run one accept/retry session.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::{build_backends, load_session_group};
use crate::cli::output::{format_score, list_table, output, CommandOutput};
use crate::domain::models::{Config, GenerationSession, SessionContext};
use crate::infrastructure::library;

#[derive(Debug, serde::Serialize)]
pub struct GenerateOutput {
    pub session: GenerationSession,
}

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let session = &self.session;
        let mut table = list_table(&["#", "variant", "tier", "outcome", "composite", "critical"]);
        for attempt in &session.attempts {
            table.add_row(vec![
                attempt.attempt_number.to_string(),
                attempt.prompt_variant.to_string(),
                attempt.tier.to_string(),
                attempt.outcome.to_string(),
                format_score(attempt.composite()),
                attempt
                    .verdict
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |v| v.critical_count.to_string()),
            ]);
        }

        let mut lines = vec![table.to_string(), String::new()];
        match session.exhaustion_reason {
            Some(reason) => lines.push(format!(
                "Outcome: {} ({reason}), best composite {}",
                session.outcome,
                format_score(session.best_composite())
            )),
            None => lines.push(format!(
                "Outcome: {}, composite {}",
                session.outcome,
                format_score(session.best_composite())
            )),
        }
        if session.warning() {
            lines.push("Warning: no attempt met the quality bar; showing the best attempt.".to_string());
        }
        if let Some(text) = session.final_text() {
            lines.push(String::new());
            lines.push(text.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(
    config: &Config,
    task: String,
    excerpts: Option<PathBuf>,
    output_path: Option<PathBuf>,
    json_mode: bool,
) -> Result<()> {
    let group = load_session_group(config)?;
    let backends = build_backends(config)?;
    let orchestrator = group.orchestrator(backends.provider, backends.judge)?;

    let mut context = SessionContext::new(task);
    if let Some(path) = excerpts {
        context = context.with_excerpts(library::load_excerpts(&path)?);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current attempt");
            on_interrupt.cancel();
        }
    });

    let session = orchestrator.run_with_cancel(context, &cancel).await;
    watcher.abort();

    if let Some(path) = output_path {
        let body = serde_json::to_string_pretty(&session).context("Failed to serialize session")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Session record written");
    }

    output(&GenerateOutput { session }, json_mode);
    Ok(())
}
