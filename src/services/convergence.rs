//! Convergence detection for optimizer scenarios.
//!
//! After each completed round the population standard deviation of the last
//! `window` composites is compared against `epsilon`. A scenario converges once
//! that check passes `stable_checks_required` times in a row.

use std::collections::VecDeque;

use crate::domain::errors::ConfigError;
use crate::domain::models::OptimizerConfig;

/// Validated convergence parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergencePolicy {
    pub window: usize,
    pub epsilon: f64,
    pub stable_checks_required: u32,
}

impl ConvergencePolicy {
    pub fn new(window: usize, epsilon: f64, stable_checks_required: u32) -> Result<Self, ConfigError> {
        if window < 2 {
            return Err(ConfigError::InvalidOptimizer(format!(
                "convergence_window must be at least 2, got {window}"
            )));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(ConfigError::InvalidOptimizer(format!(
                "convergence_epsilon must be positive, got {epsilon}"
            )));
        }
        if stable_checks_required == 0 {
            return Err(ConfigError::InvalidOptimizer(
                "stable_checks_required must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            window,
            epsilon,
            stable_checks_required,
        })
    }

    pub fn from_config(config: &OptimizerConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.convergence_window,
            config.convergence_epsilon,
            config.stable_checks_required,
        )
    }
}

/// Result of feeding one round composite into a tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceCheck {
    /// Fewer than `window` rounds observed.
    Warming,
    Unstable { std_dev: f64 },
    Stable { std_dev: f64, streak: u32 },
    Converged { std_dev: f64 },
}

/// Per-scenario rolling window of round composites.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    policy: ConvergencePolicy,
    recent: VecDeque<f64>,
    streak: u32,
    converged: bool,
}

impl ConvergenceTracker {
    pub fn new(policy: ConvergencePolicy) -> Self {
        Self {
            policy,
            recent: VecDeque::with_capacity(policy.window),
            streak: 0,
            converged: false,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn observe(&mut self, composite: f64) -> ConvergenceCheck {
        if self.recent.len() == self.policy.window {
            self.recent.pop_front();
        }
        self.recent.push_back(composite);

        if self.recent.len() < self.policy.window {
            return ConvergenceCheck::Warming;
        }

        let std_dev = population_std_dev(self.recent.iter().copied());
        if std_dev < self.policy.epsilon {
            self.streak += 1;
        } else {
            self.streak = 0;
            return ConvergenceCheck::Unstable { std_dev };
        }

        if self.streak >= self.policy.stable_checks_required {
            self.converged = true;
            ConvergenceCheck::Converged { std_dev }
        } else {
            ConvergenceCheck::Stable {
                std_dev,
                streak: self.streak,
            }
        }
    }
}

fn population_std_dev(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt()
}
