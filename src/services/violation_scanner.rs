//! Violation scanner.
//!
//! Rules are compiled once into a [`RuleSet`]; scanning a text against a
//! compiled set cannot fail. Output order is rule source order, then
//! left-to-right position. When two rules flag the identical span only the
//! higher-severity violation is kept (earlier rule on a tie).

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

use crate::domain::errors::ConfigError;
use crate::domain::models::{MatchKind, Rule, RuleSpec, Span, Violation};

/// A rule paired with its compiled matcher.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

/// Immutable, pre-compiled rule set shared by every session in a group.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules in order. The first malformed pattern fails the whole set.
    pub fn compile(rules: Vec<Rule>) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                let regex = compile_pattern(index, &rule)?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { rules })
    }

    /// Convert raw configuration records and compile them.
    pub fn from_specs(specs: Vec<RuleSpec>) -> Result<Self, ConfigError> {
        let rules = specs
            .into_iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::compile(rules)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_pattern(index: usize, rule: &Rule) -> Result<Regex, ConfigError> {
    if rule.pattern.trim().is_empty() {
        return Err(ConfigError::EmptyPattern {
            index,
            category: rule.category.to_string(),
        });
    }

    let source = match rule.kind {
        MatchKind::Literal => regex::escape(&rule.pattern),
        MatchKind::Word => {
            let escaped = regex::escape(&rule.pattern);
            // `\b` next to a non-word character would demand a word char on
            // the far side, so only anchor the ends that are word characters.
            let lead = if starts_with_word_char(&rule.pattern) { r"\b" } else { "" };
            let tail = if ends_with_word_char(&rule.pattern) { r"\b" } else { "" };
            format!("{lead}{escaped}{tail}")
        }
        MatchKind::Regex => rule.pattern.clone(),
    };

    RegexBuilder::new(&source)
        .case_insensitive(!rule.case_sensitive)
        .build()
        .map_err(|e| ConfigError::InvalidPattern {
            index,
            category: rule.category.to_string(),
            pattern: rule.pattern.clone(),
            reason: e.to_string(),
        })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn starts_with_word_char(pattern: &str) -> bool {
    pattern.chars().next().is_some_and(is_word_char)
}

fn ends_with_word_char(pattern: &str) -> bool {
    pattern.chars().next_back().is_some_and(is_word_char)
}

/// Pure, deterministic scanner over a compiled [`RuleSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ViolationScanner;

impl ViolationScanner {
    /// Scan `text` with every rule in the set.
    pub fn scan(text: &str, rules: &RuleSet) -> Vec<Violation> {
        // (rule index, violation); `by_span` points at the current holder of a span.
        let mut hits: Vec<(usize, Violation)> = Vec::new();
        let mut by_span: HashMap<Span, usize> = HashMap::new();

        for (index, compiled) in rules.rules.iter().enumerate() {
            for m in compiled.regex.find_iter(text) {
                if m.start() == m.end() {
                    continue;
                }
                let violation = Violation {
                    category: compiled.rule.category.clone(),
                    severity: compiled.rule.severity,
                    matched_text: m.as_str().to_string(),
                    span: Span::new(m.start(), m.end()),
                };

                match by_span.get(&violation.span) {
                    Some(&slot) => {
                        if violation.severity > hits[slot].1.severity {
                            hits[slot] = (index, violation);
                        }
                    }
                    None => {
                        by_span.insert(violation.span, hits.len());
                        hits.push((index, violation));
                    }
                }
            }
        }

        hits.sort_by_key(|(index, v)| (*index, v.span.start));
        hits.into_iter().map(|(_, v)| v).collect()
    }

    /// Compile and scan in one call. A malformed pattern is a [`ConfigError`].
    pub fn scan_rules(text: &str, rules: &[Rule]) -> Result<Vec<Violation>, ConfigError> {
        let set = RuleSet::compile(rules.to_vec())?;
        Ok(Self::scan(text, &set))
    }
}
