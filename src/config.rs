use crate::rule::body::RuleBody;
use crate::types::{AgentRole, Severity};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub verdict: VerdictConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub autofix: AutofixConfig,
    /// Extra rules appended to the built-in rule set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleBody>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReviewConfig {
    #[serde(default)]
    pub max_parallel_agents: Option<usize>,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    #[serde(default = "default_max_inline_comments")]
    pub max_inline_comments: usize,
    /// Findings on files matching these globs are dropped before aggregation
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Run the built-in rule agent over the local diff
    #[serde(default = "default_true")]
    pub rules_agent: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: None,
            agent_timeout_secs: default_agent_timeout_secs(),
            max_inline_comments: default_max_inline_comments(),
            exclude: default_exclude(),
            rules_agent: true,
        }
    }
}

fn default_agent_timeout_secs() -> u64 {
    120
}

fn default_max_inline_comments() -> usize {
    30
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/*.lock".into(),
        "**/*-lock.json".into(),
        "**/*.min.*".into(),
        "**/dist/**".into(),
        "**/node_modules/**".into(),
    ]
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DedupConfig {
    /// Message prefix length in the fingerprint of file-level findings
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,
    /// Message prefix length in the fingerprint of line-anchored findings
    #[serde(default = "default_anchored_prefix_chars")]
    pub anchored_prefix_chars: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            prefix_chars: default_prefix_chars(),
            anchored_prefix_chars: default_anchored_prefix_chars(),
        }
    }
}

fn default_prefix_chars() -> usize {
    50
}

fn default_anchored_prefix_chars() -> usize {
    24
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScoringConfig {
    #[serde(default)]
    pub roles: RoleWeights,
    #[serde(default)]
    pub profiles: SeverityProfiles,
    #[serde(default = "default_category_multipliers")]
    pub category_multipliers: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            roles: RoleWeights::default(),
            profiles: SeverityProfiles::default(),
            category_multipliers: default_category_multipliers(),
        }
    }
}

impl ScoringConfig {
    pub fn category_multiplier(&self, category: &str) -> f64 {
        self.category_multipliers
            .get(&category.to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0)
    }
}

fn default_category_multipliers() -> BTreeMap<String, f64> {
    [
        ("algorithm", 2.0),
        ("structure", 1.5),
        ("complexity", 1.2),
        ("memory", 1.2),
        ("database", 1.2),
        ("documentation", 0.8),
        ("naming", 0.8),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Cross-agent weight per role; renormalized over the agents that ran
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RoleWeights {
    pub security: f64,
    pub quality: f64,
    pub performance: f64,
    pub testing: f64,
    pub style: f64,
    pub summary: f64,
    pub other: f64,
}

impl Default for RoleWeights {
    fn default() -> Self {
        Self {
            security: 0.3,
            quality: 0.25,
            performance: 0.2,
            testing: 0.15,
            style: 0.1,
            summary: 0.1,
            other: 0.1,
        }
    }
}

impl RoleWeights {
    pub fn weight(&self, role: AgentRole) -> f64 {
        match role {
            AgentRole::Security => self.security,
            AgentRole::Quality => self.quality,
            AgentRole::Performance => self.performance,
            AgentRole::Testing => self.testing,
            AgentRole::Style => self.style,
            AgentRole::Summary => self.summary,
            AgentRole::Other => self.other,
        }
    }
}

/// Points deducted per finding of each severity
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct SeverityWeights {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl SeverityWeights {
    pub const fn new(high: f64, medium: f64, low: f64) -> Self {
        Self { high, medium, low }
    }

    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Severity weights per agent role, so performance agents can punish
/// high findings harder than style agents
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SeverityProfiles {
    pub security: SeverityWeights,
    pub quality: SeverityWeights,
    pub performance: SeverityWeights,
    pub testing: SeverityWeights,
    pub style: SeverityWeights,
    pub summary: SeverityWeights,
    pub other: SeverityWeights,
}

impl Default for SeverityProfiles {
    fn default() -> Self {
        Self {
            security: SeverityWeights::new(30.0, 12.0, 4.0),
            quality: SeverityWeights::new(25.0, 10.0, 3.0),
            performance: SeverityWeights::new(35.0, 15.0, 5.0),
            testing: SeverityWeights::new(20.0, 10.0, 3.0),
            style: SeverityWeights::new(20.0, 8.0, 2.0),
            summary: SeverityWeights::new(25.0, 10.0, 3.0),
            other: SeverityWeights::new(25.0, 10.0, 3.0),
        }
    }
}

impl SeverityProfiles {
    pub fn for_role(&self, role: AgentRole) -> &SeverityWeights {
        match role {
            AgentRole::Security => &self.security,
            AgentRole::Quality => &self.quality,
            AgentRole::Performance => &self.performance,
            AgentRole::Testing => &self.testing,
            AgentRole::Style => &self.style,
            AgentRole::Summary => &self.summary,
            AgentRole::Other => &self.other,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PriorityConfig {
    #[serde(default = "default_category_ranks")]
    pub category_ranks: BTreeMap<String, u32>,
    /// Rank of any category missing from the table
    #[serde(default = "default_rank")]
    pub default_rank: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            category_ranks: default_category_ranks(),
            default_rank: default_rank(),
        }
    }
}

impl PriorityConfig {
    pub fn rank(&self, category: &str) -> u32 {
        self.category_ranks
            .get(&category.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default_rank)
    }
}

fn default_category_ranks() -> BTreeMap<String, u32> {
    [
        ("security", 10),
        ("authentication", 9),
        ("injection", 9),
        ("exposure", 8),
        ("algorithm", 7),
        ("memory", 6),
        ("database", 6),
        ("structure", 5),
        ("complexity", 5),
        ("performance", 4),
        ("network", 4),
        ("naming", 3),
        ("documentation", 2),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_rank() -> u32 {
    1
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct VerdictConfig {
    /// Minimum overall score for APPROVE
    #[serde(default = "default_approve_threshold")]
    pub approve_threshold: u8,
    /// Categories whose findings at `blocking_severity` or above force REQUEST_CHANGES
    #[serde(default = "default_blocking_categories")]
    pub blocking_categories: Vec<String>,
    #[serde(default = "default_blocking_severity")]
    pub blocking_severity: Severity,
    /// Force REQUEST_CHANGES when the change set is assessed as high risk
    #[serde(default = "default_true")]
    pub block_on_high_risk: bool,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            approve_threshold: default_approve_threshold(),
            blocking_categories: default_blocking_categories(),
            blocking_severity: default_blocking_severity(),
            block_on_high_risk: true,
        }
    }
}

fn default_approve_threshold() -> u8 {
    85
}

fn default_blocking_categories() -> Vec<String> {
    vec!["security".into()]
}

fn default_blocking_severity() -> Severity {
    Severity::High
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RiskConfig {
    /// Touching any of these paths makes the change high risk
    #[serde(default = "default_sensitive_paths")]
    pub sensitive_paths: Vec<String>,
    #[serde(default = "default_high_changed_lines")]
    pub high_changed_lines: usize,
    #[serde(default = "default_medium_changed_lines")]
    pub medium_changed_lines: usize,
    #[serde(default = "default_medium_changed_files")]
    pub medium_changed_files: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sensitive_paths: default_sensitive_paths(),
            high_changed_lines: default_high_changed_lines(),
            medium_changed_lines: default_medium_changed_lines(),
            medium_changed_files: default_medium_changed_files(),
        }
    }
}

fn default_sensitive_paths() -> Vec<String> {
    vec![
        "**/auth/**".into(),
        "**/*secret*".into(),
        "**/migrations/**".into(),
        ".github/workflows/**".into(),
        "**/.env*".into(),
    ]
}

fn default_high_changed_lines() -> usize {
    500
}

fn default_medium_changed_lines() -> usize {
    150
}

fn default_medium_changed_files() -> usize {
    15
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AutofixConfig {
    /// Categories whose findings may be fixed automatically
    #[serde(default = "default_autofix_categories")]
    pub categories: Vec<String>,
    /// Rule ids whose findings may be fixed automatically regardless of category
    #[serde(default = "default_autofix_rule_ids")]
    pub rule_ids: Vec<String>,
    /// Fixes below this confidence are not surfaced
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            categories: default_autofix_categories(),
            rule_ids: default_autofix_rule_ids(),
            min_confidence: default_min_confidence(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_autofix_categories() -> Vec<String> {
    vec!["style".into(), "quality".into()]
}

fn default_autofix_rule_ids() -> Vec<String> {
    vec![
        "no-console".into(),
        "no-magic-numbers".into(),
        "no-empty-catch".into(),
        "no-todo".into(),
    ]
}

fn default_min_confidence() -> u8 {
    80
}

fn default_similarity_threshold() -> f64 {
    0.7
}

impl Config {
    /// Load config from a TOML file, applying `key.path=value` overrides
    ///
    /// A missing file yields the built-in defaults so the tool works without setup.
    pub fn load(path: &str, overrides: &[String]) -> Result<Self> {
        let mut table = if Path::new(path).exists() {
            let content =
                fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
            toml::from_str::<toml::Table>(&content)
                .with_context(|| format!("Failed to parse {}", path))?
        } else {
            info!("Config {} not found, using defaults", path);
            toml::Table::new()
        };

        for raw in overrides {
            apply_override(&mut table, raw)?;
        }

        let config: Config = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("Invalid config in {}", path))?;
        config.validate()?;
        debug!("Loaded config with {} extra rules", config.rules.len());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.verdict.approve_threshold > 100 {
            bail!(
                "verdict.approve_threshold must be within 0..=100, got {}",
                self.verdict.approve_threshold
            );
        }
        if self.autofix.min_confidence > 100 {
            bail!(
                "autofix.min_confidence must be within 0..=100, got {}",
                self.autofix.min_confidence
            );
        }
        if self.dedup.prefix_chars == 0 || self.dedup.anchored_prefix_chars == 0 {
            bail!("dedup prefix lengths must be positive");
        }
        for role in AgentRole::ALL {
            let weight = self.scoring.roles.weight(role);
            if !weight.is_finite() || weight < 0.0 {
                bail!("scoring.roles.{} must be a non-negative number", role);
            }
        }
        Ok(())
    }

    /// Render the config as TOML (used by `init`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// Set `a.b.c=value` in a parsed TOML table, creating intermediate tables
///
/// The value is parsed as a TOML literal when possible (numbers, booleans,
/// arrays, quoted strings) and kept as a bare string otherwise.
fn apply_override(table: &mut toml::Table, raw: &str) -> Result<()> {
    let Some((path, value)) = raw.split_once('=') else {
        bail!("Invalid override '{}', expected key.path=value", raw);
    };
    let keys: Vec<&str> = path.trim().split('.').map(str::trim).collect();
    if keys.iter().any(|k| k.is_empty()) {
        bail!("Invalid override key '{}'", path);
    }

    let value = parse_override_value(value.trim());
    let (last, parents) = keys.split_last().context("Empty override key")?;

    let mut current = table;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        current = match entry {
            toml::Value::Table(t) => t,
            _ => bail!("Override '{}': '{}' is not a table", raw, key),
        };
    }
    debug!("Config override {} = {}", path, value);
    current.insert(last.to_string(), value);
    Ok(())
}

fn parse_override_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
