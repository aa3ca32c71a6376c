//! Deterministic instruction-level mutation of prompt templates.
//!
//! Each template line is one instruction. Lines starting with `!` are
//! protected and are never reworded, moved or removed.

use std::fmt;

use crate::domain::models::{OptimizerConfig, PromptVariant, VariantId};
use crate::domain::ports::MutationStrategy;
use crate::services::retry_orchestrator::PROTECTED_PREFIX;

/// Separates a variant's root id from its round suffix.
const ROUND_SEPARATOR: &str = "~r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Reword,
    Reorder,
    Tighten,
    Loosen,
}

impl MutationOp {
    const ROTATION: [Self; 4] = [Self::Reword, Self::Reorder, Self::Tighten, Self::Loosen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reword => "reword",
            Self::Reorder => "reorder",
            Self::Tighten => "tighten",
            Self::Loosen => "loosen",
        }
    }

    /// Operation tried first for `round`; round 2 starts the rotation.
    pub fn for_round(round: u32) -> Self {
        Self::ROTATION[(round.saturating_sub(2) % 4) as usize]
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotates through reword, reorder, tighten and loosen, falling through to the
/// next operation when one would leave the template unchanged.
#[derive(Debug, Clone)]
pub struct InstructionMutator {
    rewordings: Vec<(String, String)>,
    constraints: Vec<String>,
}

impl InstructionMutator {
    pub fn new(rewordings: Vec<(String, String)>, constraints: Vec<String>) -> Self {
        Self {
            rewordings,
            constraints,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.rewordings.clone(), config.tightening_constraints.clone())
    }

    /// Apply one operation, or `None` if it would change nothing.
    pub fn apply(&self, op: MutationOp, lines: &[String], round: u32) -> Option<Vec<String>> {
        match op {
            MutationOp::Reword => self.reword(lines, round),
            MutationOp::Reorder => reorder(lines),
            MutationOp::Tighten => self.tighten(lines),
            MutationOp::Loosen => self.loosen(lines),
        }
    }

    fn reword(&self, lines: &[String], round: u32) -> Option<Vec<String>> {
        if self.rewordings.is_empty() {
            return None;
        }
        let start = round as usize % self.rewordings.len();
        let order = self.rewordings[start..].iter().chain(&self.rewordings[..start]);

        for (from, to) in order {
            if from.is_empty() {
                continue;
            }
            if let Some(index) = lines
                .iter()
                .position(|line| !is_protected(line) && line.contains(from.as_str()))
            {
                let mut out = lines.to_vec();
                out[index] = lines[index].replacen(from.as_str(), to, 1);
                return Some(out);
            }
        }
        None
    }

    fn tighten(&self, lines: &[String]) -> Option<Vec<String>> {
        let constraint = self
            .constraints
            .iter()
            .find(|c| !lines.iter().any(|line| line.trim() == c.trim()))?;
        let mut out = lines.to_vec();
        out.push(constraint.clone());
        Some(out)
    }

    fn loosen(&self, lines: &[String]) -> Option<Vec<String>> {
        let index = lines.iter().rposition(|line| {
            !is_protected(line) && self.constraints.iter().any(|c| c.trim() == line.trim())
        })?;
        let mut out = lines.to_vec();
        out.remove(index);
        Some(out)
    }
}

impl Default for InstructionMutator {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

/// Move the last unprotected instruction to the first unprotected slot.
fn reorder(lines: &[String]) -> Option<Vec<String>> {
    let slots: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !is_protected(line))
        .map(|(i, _)| i)
        .collect();
    if slots.len() < 2 {
        return None;
    }

    let mut movable: Vec<String> = slots.iter().map(|&i| lines[i].clone()).collect();
    movable.rotate_right(1);
    if movable.iter().zip(&slots).all(|(line, &i)| *line == lines[i]) {
        return None;
    }

    let mut out = lines.to_vec();
    for (line, &i) in movable.into_iter().zip(&slots) {
        out[i] = line;
    }
    Some(out)
}

fn is_protected(line: &str) -> bool {
    line.trim_start().starts_with(PROTECTED_PREFIX)
}

fn candidate_id(base: &VariantId, round: u32) -> VariantId {
    let root = base
        .as_str()
        .split(ROUND_SEPARATOR)
        .next()
        .unwrap_or_default();
    VariantId::new(format!("{root}{ROUND_SEPARATOR}{round}"))
}

impl MutationStrategy for InstructionMutator {
    fn name(&self) -> &'static str {
        "instruction"
    }

    fn mutate(&self, base: &PromptVariant, round: u32) -> PromptVariant {
        let lines: Vec<String> = base.instructions().map(str::to_string).collect();
        let first = (round.saturating_sub(2) % 4) as usize;

        let mutated = (0..MutationOp::ROTATION.len())
            .map(|offset| MutationOp::ROTATION[(first + offset) % MutationOp::ROTATION.len()])
            .find_map(|op| self.apply(op, &lines, round).map(|out| (op, out)));

        let template = match mutated {
            Some((op, out)) => {
                tracing::debug!(variant = %base.id, round, op = op.as_str(), "Mutated prompt variant");
                out.join("\n")
            }
            None => base.template.clone(),
        };

        PromptVariant {
            id: candidate_id(&base.id, round),
            template,
            tier: 0,
        }
    }
}
