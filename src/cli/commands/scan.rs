//! `scrivener scan`: report rule violations in a piece of text.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;

use super::{build_backends, load_session_group};
use crate::cli::output::{format_score, list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, QualityVerdict, SeverityCounts, Violation};
use crate::services::ViolationScanner;

#[derive(Debug, serde::Serialize)]
pub struct ScanOutput {
    pub source: String,
    pub violations: Vec<Violation>,
    pub counts: SeverityCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<QualityVerdict>,
}

impl CommandOutput for ScanOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.violations.is_empty() {
            lines.push(format!("No violations found in {}.", self.source));
        } else {
            let mut table = list_table(&["severity", "category", "span", "match"]);
            for v in &self.violations {
                table.add_row(vec![
                    v.severity.as_str().to_string(),
                    v.category.to_string(),
                    format!("{}..{}", v.span.start, v.span.end),
                    truncate(&v.matched_text, 40),
                ]);
            }
            lines.push(format!(
                "{} violation(s) in {} (critical {}, high {}, medium {}, low {}):",
                self.violations.len(),
                self.source,
                self.counts.critical,
                self.counts.high,
                self.counts.medium,
                self.counts.low
            ));
            lines.push(table.to_string());
        }

        if let Some(verdict) = &self.verdict {
            lines.push(format!(
                "Composite: {}{}",
                format_score(Some(verdict.composite)),
                if verdict.degraded { " (degraded: judge unavailable)" } else { "" }
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Where the scanned text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    Text(String),
    File(PathBuf),
    Stdin,
}

impl ScanInput {
    pub fn from_args(text: Option<String>, file: Option<PathBuf>) -> Self {
        match (text, file) {
            (Some(text), _) => Self::Text(text),
            (None, Some(path)) => Self::File(path),
            (None, None) => Self::Stdin,
        }
    }

    fn read(self) -> Result<(String, String)> {
        match self {
            Self::Text(text) => Ok(("argument".to_string(), text)),
            Self::File(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok((path.display().to_string(), text))
            }
            Self::Stdin => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                Ok(("stdin".to_string(), buf))
            }
        }
    }
}

pub async fn execute(
    config: &Config,
    input: ScanInput,
    rules_path: Option<PathBuf>,
    evaluate: bool,
    json_mode: bool,
) -> Result<()> {
    let (source, text) = input.read()?;

    let group = match rules_path {
        Some(path) => {
            let mut config = config.clone();
            config.rules_path = path;
            load_session_group(&config)?
        }
        None => load_session_group(config)?,
    };

    let (violations, verdict) = if evaluate {
        let backends = build_backends(config)?;
        let verdict = group.evaluator(backends.judge)?.evaluate(&text).await;
        (verdict.violations.clone(), Some(verdict))
    } else {
        (ViolationScanner::scan(&text, group.rules()), None)
    };

    tracing::info!(source = %source, violations = violations.len(), "Scan complete");

    let result = ScanOutput {
        source,
        counts: SeverityCounts::tally(&violations),
        violations,
        verdict,
    };
    output(&result, json_mode);
    Ok(())
}
