//! Prompt variants, the prompt library, and the escalation ladder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::errors::ConfigError;

/// Identifier of a prompt variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub String);

impl VariantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A prompt template at a given strictness tier. Tier 0 is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub id: VariantId,
    pub template: String,
    pub tier: u32,
}

impl PromptVariant {
    pub fn new(id: impl Into<String>, template: impl Into<String>, tier: u32) -> Self {
        Self {
            id: VariantId::new(id),
            template: template.into(),
            tier,
        }
    }

    /// Non-blank template lines; each line is one instruction.
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.template.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions().count()
    }

    /// Whether this template is simpler than `other`: fewer instructions,
    /// then fewer bytes.
    pub fn is_shorter_than(&self, other: &Self) -> bool {
        (self.instruction_count(), self.template.len())
            < (other.instruction_count(), other.template.len())
    }
}

/// The validated set of prompt variants loaded at session-group startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptLibrary {
    variants: Vec<PromptVariant>,
}

impl PromptLibrary {
    /// Validate and sort variants by tier.
    pub fn new(mut variants: Vec<PromptVariant>) -> Result<Self, ConfigError> {
        let mut ids = HashSet::new();
        let mut tiers = HashSet::new();
        for variant in &variants {
            if variant.template.trim().is_empty() {
                return Err(ConfigError::EmptyTemplate(variant.id.to_string()));
            }
            if !ids.insert(variant.id.clone()) {
                return Err(ConfigError::DuplicateVariantId(variant.id.to_string()));
            }
            if !tiers.insert(variant.tier) {
                return Err(ConfigError::DuplicateTier(variant.tier));
            }
        }
        if !tiers.contains(&0) {
            return Err(ConfigError::MissingTierZero);
        }

        variants.sort_by_key(|v| v.tier);
        Ok(Self { variants })
    }

    pub fn variants(&self) -> &[PromptVariant] {
        &self.variants
    }

    pub fn get(&self, id: &VariantId) -> Option<&PromptVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    pub fn base(&self) -> &PromptVariant {
        // Construction guarantees a tier-0 variant sorted first.
        &self.variants[0]
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Fixed, ordered sequence of variants tried as quality gates fail.
///
/// Starts at tier 0 and strictly increases; never mutated once built.
/// Deserializing goes through the same validation as [`EscalationLadder::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PromptVariant>", into = "Vec<PromptVariant>")]
pub struct EscalationLadder {
    rungs: Vec<PromptVariant>,
}

impl EscalationLadder {
    /// Build a ladder from explicit variant ids, or from the whole library in
    /// tier order when `ids` is empty.
    pub fn from_library(library: &PromptLibrary, ids: &[VariantId]) -> Result<Self, ConfigError> {
        let rungs = if ids.is_empty() {
            library.variants().to_vec()
        } else {
            ids.iter()
                .map(|id| {
                    library
                        .get(id)
                        .cloned()
                        .ok_or_else(|| ConfigError::UnknownVariant(id.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::new(rungs)
    }

    pub fn new(rungs: Vec<PromptVariant>) -> Result<Self, ConfigError> {
        match rungs.first() {
            None => return Err(ConfigError::InvalidLadder("ladder is empty".to_string())),
            Some(first) if first.tier != 0 => {
                return Err(ConfigError::InvalidLadder(format!(
                    "first rung `{}` is tier {}",
                    first.id, first.tier
                )))
            }
            Some(_) => {}
        }
        for pair in rungs.windows(2) {
            if pair[1].tier <= pair[0].tier {
                return Err(ConfigError::InvalidLadder(format!(
                    "`{}` (tier {}) follows `{}` (tier {})",
                    pair[1].id, pair[1].tier, pair[0].id, pair[0].tier
                )));
            }
        }
        Ok(Self { rungs })
    }

    /// Same ladder with the tier-0 rung replaced by `base`.
    pub fn with_base(&self, base: PromptVariant) -> Result<Self, ConfigError> {
        let mut rungs = self.rungs.clone();
        rungs[0] = PromptVariant { tier: 0, ..base };
        Self::new(rungs)
    }

    pub fn rung(&self, index: usize) -> &PromptVariant {
        &self.rungs[index.min(self.rungs.len() - 1)]
    }

    pub fn base(&self) -> &PromptVariant {
        &self.rungs[0]
    }

    pub fn top_index(&self) -> usize {
        self.rungs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn rungs(&self) -> &[PromptVariant] {
        &self.rungs
    }
}

impl TryFrom<Vec<PromptVariant>> for EscalationLadder {
    type Error = ConfigError;

    fn try_from(rungs: Vec<PromptVariant>) -> Result<Self, Self::Error> {
        Self::new(rungs)
    }
}

impl From<EscalationLadder> for Vec<PromptVariant> {
    fn from(ladder: EscalationLadder) -> Self {
        ladder.rungs
    }
}
