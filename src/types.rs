use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a review finding
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    /// Numeric rank used for ordering (high=3, medium=2, low=1)
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse the loose severity vocabulary models tend to emit
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "blocker" | "error" | "severe" => Some(Self::High),
            "medium" | "moderate" | "major" | "warning" | "warn" => Some(Self::Medium),
            "low" | "minor" | "info" | "nit" | "trivial" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single reviewer observation about a file or line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Relative file path ("general" for PR-level observations)
    pub file: String,
    /// 1-based line number; absent for file-level comments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Human-readable issue description
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    /// Open vocabulary: security, quality, performance, style, testing, ...
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Name of the agent that produced the finding
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Set by an agent to block the merge regardless of score
    #[serde(default, skip_serializing_if = "is_false")]
    pub blocking: bool,
}

pub fn default_category() -> String {
    "general".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Finding {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            message: message.into(),
            severity: Severity::default(),
            category: default_category(),
            suggestion: None,
            source: String::new(),
            rule_id: None,
            blocking: false,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// `file:line`, or just `file` when unanchored
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }
}

/// Stable role of an agent, used to pick scoring weights and profiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Security,
    Quality,
    Performance,
    Testing,
    Style,
    Summary,
    #[default]
    Other,
}

impl AgentRole {
    pub const ALL: [AgentRole; 7] = [
        Self::Security,
        Self::Quality,
        Self::Performance,
        Self::Testing,
        Self::Style,
        Self::Summary,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Quality => "quality",
            Self::Performance => "performance",
            Self::Testing => "testing",
            Self::Style => "style",
            Self::Summary => "summary",
            Self::Other => "other",
        }
    }

    /// Best-effort role for an agent registered without one
    ///
    /// Matches role keywords inside the display name (e.g. "Security Agent"),
    /// falling back to `Other` for personas.
    pub fn infer(agent_name: &str) -> Self {
        let lower = agent_name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .filter(|role| *role != Self::Other)
            .find(|role| lower.contains(role.label()))
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.label() == lower)
            .ok_or_else(|| format!("unknown agent role '{}'", s))
    }
}

/// One agent's complete output for a single analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingSet {
    pub agent_name: String,
    pub role: AgentRole,
    /// Agent self-score, 0..=100
    pub score: u8,
    pub findings: Vec<Finding>,
    pub elapsed_ms: u64,
    /// The agent errored or timed out and contributes nothing but a passing score
    #[serde(default)]
    pub failed: bool,
}

impl FindingSet {
    pub fn new(
        agent_name: impl Into<String>,
        role: AgentRole,
        score: u8,
        findings: Vec<Finding>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            role,
            score: score.min(100),
            findings,
            elapsed_ms,
            failed: false,
        }
    }

    /// Placeholder for an agent that failed: score 100, no findings
    pub fn failed(agent_name: impl Into<String>, role: AgentRole, elapsed_ms: u64) -> Self {
        Self {
            failed: true,
            ..Self::new(agent_name, role, 100, Vec::new(), elapsed_ms)
        }
    }
}

/// Final merge recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approve,
    Comment,
    RequestChanges,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Comment => "COMMENT",
            Self::RequestChanges => "REQUEST_CHANGES",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Independently computed risk of a change set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// The engine's output for one PR analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReview {
    /// Deduplicated findings in priority order
    pub findings: Vec<Finding>,
    pub overall_score: u8,
    pub verdict: Verdict,
    pub per_category_counts: BTreeMap<String, usize>,
}

/// An auto-fix judged safe enough to surface, with its confidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    pub file: String,
    pub line: u32,
    pub original_code: String,
    /// Replacement line; empty means "delete this line"
    pub fixed_code: String,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl FixSuggestion {
    pub fn is_deletion(&self) -> bool {
        self.fixed_code.is_empty()
    }
}
