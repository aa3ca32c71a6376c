use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for scrivener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path to the violation rule file (YAML list of rule records)
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,

    /// Path to the prompt variant library (YAML list of variants)
    #[serde(default = "default_variants_path")]
    pub variants_path: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Quality evaluator configuration
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Prompt optimizer configuration
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Generation provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Rubric judge configuration
    #[serde(default)]
    pub judge: JudgeConfig,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("rules.yaml")
}

fn default_variants_path() -> PathBuf {
    PathBuf::from("variants.yaml")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: default_rules_path(),
            variants_path: default_variants_path(),
            logging: LoggingConfig::default(),
            retry: RetryConfig::default(),
            evaluator: EvaluatorConfig::default(),
            optimizer: OptimizerConfig::default(),
            provider: ProviderConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum attempts per session
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum composite score to accept (0-5)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,

    /// Variant ids in escalation order; empty means every library variant by tier
    #[serde(default)]
    pub escalation_ladder: Vec<String>,

    /// Consecutive provider failures before a session is aborted
    #[serde(default = "default_max_consecutive_provider_errors")]
    pub max_consecutive_provider_errors: u32,

    /// Per-call generation timeout in milliseconds
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Per-call rubric judge timeout in milliseconds
    #[serde(default = "default_judge_timeout_ms")]
    pub judge_timeout_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_acceptance_threshold() -> f64 {
    3.5
}

const fn default_max_consecutive_provider_errors() -> u32 {
    2
}

const fn default_generation_timeout_ms() -> u64 {
    120_000
}

const fn default_judge_timeout_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            acceptance_threshold: default_acceptance_threshold(),
            escalation_ladder: Vec::new(),
            max_consecutive_provider_errors: default_max_consecutive_provider_errors(),
            generation_timeout_ms: default_generation_timeout_ms(),
            judge_timeout_ms: default_judge_timeout_ms(),
        }
    }
}

/// Quality evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluatorConfig {
    /// Dimension score substituted when the judge response is unusable
    #[serde(default = "default_neutral_dimension_score")]
    pub neutral_dimension_score: f64,
}

const fn default_neutral_dimension_score() -> f64 {
    2.5
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            neutral_dimension_score: default_neutral_dimension_score(),
        }
    }
}

/// Prompt optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizerConfig {
    /// Round budget per scenario
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Number of recent rounds whose composite spread is checked
    #[serde(default = "default_convergence_window")]
    pub convergence_window: usize,

    /// Standard deviation below which a window counts as stable
    #[serde(default = "default_convergence_epsilon")]
    pub convergence_epsilon: f64,

    /// Consecutive stable checks required to mark a scenario converged
    #[serde(default = "default_stable_checks_required")]
    pub stable_checks_required: u32,

    /// Minimum delay between provider calls across all scenarios
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,

    /// Scenarios optimized at the same time
    #[serde(default = "default_max_concurrent_scenarios")]
    pub max_concurrent_scenarios: usize,

    /// Constraints the mutation strategy may append when tightening
    #[serde(default = "default_tightening_constraints")]
    pub tightening_constraints: Vec<String>,

    /// `[from, to]` wording substitutions for rewording mutations
    #[serde(default = "default_rewordings")]
    pub rewordings: Vec<(String, String)>,
}

const fn default_rounds() -> u32 {
    5
}

const fn default_convergence_window() -> usize {
    3
}

const fn default_convergence_epsilon() -> f64 {
    0.05
}

const fn default_stable_checks_required() -> u32 {
    2
}

const fn default_min_call_interval_ms() -> u64 {
    250
}

const fn default_max_concurrent_scenarios() -> usize {
    4
}

fn default_tightening_constraints() -> Vec<String> {
    vec![
        "Cut every sentence that does not carry a concrete fact.".to_string(),
        "Name specific numbers, people or places instead of vague quantities.".to_string(),
        "State claims directly; do not hedge.".to_string(),
    ]
}

fn default_rewordings() -> Vec<(String, String)> {
    vec![
        ("Write".to_string(), "Draft".to_string()),
        ("avoid".to_string(), "never use".to_string()),
        ("clear".to_string(), "plain".to_string()),
    ]
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            convergence_window: default_convergence_window(),
            convergence_epsilon: default_convergence_epsilon(),
            stable_checks_required: default_stable_checks_required(),
            min_call_interval_ms: default_min_call_interval_ms(),
            max_concurrent_scenarios: default_max_concurrent_scenarios(),
            tightening_constraints: default_tightening_constraints(),
            rewordings: default_rewordings(),
        }
    }
}

/// Which generation provider backs the CLI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Scripted,
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Model used for generation
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; falls back to ANTHROPIC_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Max tokens to generate per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Canned responses for the scripted provider (YAML list of strings)
    #[serde(default)]
    pub responses_path: Option<PathBuf>,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_request_timeout_secs() -> u64 {
    180
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            responses_path: None,
        }
    }
}

/// Rubric judge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    /// Model used for rubric scoring; the provider model when unset
    #[serde(default)]
    pub model: Option<String>,

    /// Canned score records for the scripted judge (YAML list)
    #[serde(default)]
    pub scores_path: Option<PathBuf>,
}
