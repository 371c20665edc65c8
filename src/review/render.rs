use crate::types::{AggregatedReview, Finding, FindingSet, FixSuggestion, RiskLevel, Verdict};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const ELAPSED_TIME_PRECISION: usize = 2;

/// Code host whose review-event vocabulary the verdict is mapped onto
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Host {
    #[default]
    GitHub,
    GitLab,
}

impl FromStr for Host {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(format!("unknown host '{}', expected github or gitlab", other)),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        })
    }
}

/// Review event the publisher should send for `verdict`
pub fn host_event(verdict: Verdict, host: Host) -> &'static str {
    match (host, verdict) {
        (Host::GitHub, v) => v.label(),
        (Host::GitLab, Verdict::Approve) => "approve",
        (Host::GitLab, Verdict::Comment) => "note",
        (Host::GitLab, Verdict::RequestChanges) => "unapprove",
    }
}

/// The first `max` line-anchored findings, in priority order
pub fn inline_comments(review: &AggregatedReview, max: usize) -> Vec<&Finding> {
    review
        .findings
        .iter()
        .filter(|f| f.line.is_some())
        .take(max)
        .collect()
}

/// Everything a rendered report needs
pub struct Report<'a> {
    pub review: &'a AggregatedReview,
    pub agents: &'a [FindingSet],
    pub fixes: &'a [FixSuggestion],
    pub risk: RiskLevel,
    pub host: Host,
    pub max_findings: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    risk: RiskLevel,
    event: &'static str,
    review: &'a AggregatedReview,
    agents: &'a [FindingSet],
    fixes: &'a [FixSuggestion],
}

pub fn format_json(report: &Report, generated_at: DateTime<Utc>) -> Result<String> {
    let output = JsonReport {
        generated_at,
        risk: report.risk,
        event: host_event(report.review.verdict, report.host),
        review: report.review,
        agents: report.agents,
        fixes: report.fixes,
    };
    serde_json::to_string_pretty(&output).context("Failed to serialize review report")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn format_markdown(report: &Report) -> String {
    let review = report.review;
    let mut output = String::new();

    output.push_str(&format!("# Review: {}\n\n", review.verdict));
    output.push_str(&format!(
        "**Score:** {}/100 | **Risk:** {} | **Event:** {}\n\n",
        review.overall_score,
        report.risk,
        host_event(review.verdict, report.host)
    ));

    if !review.per_category_counts.is_empty() {
        output.push_str("## Findings by category\n\n| Category | Count |\n|---|---|\n");
        for (category, count) in &review.per_category_counts {
            output.push_str(&format!("| {} | {} |\n", escape_cell(category), count));
        }
        output.push('\n');
    }

    if !report.agents.is_empty() {
        output.push_str("## Agents\n\n| Agent | Role | Score | Findings | Time |\n|---|---|---|---|---|\n");
        for set in report.agents {
            let score = if set.failed {
                "failed".to_string()
            } else {
                set.score.to_string()
            };
            output.push_str(&format!(
                "| {} | {} | {} | {} | {:.prec$}s |\n",
                escape_cell(&set.agent_name),
                set.role,
                score,
                set.findings.len(),
                set.elapsed_ms as f64 / 1000.0,
                prec = ELAPSED_TIME_PRECISION
            ));
        }
        output.push('\n');
    }

    if review.findings.is_empty() {
        output.push_str("No findings.\n");
    } else {
        output.push_str("## Findings\n\n");
        for finding in review.findings.iter().take(report.max_findings) {
            output.push_str(&format!(
                "- **{}** `{}` [{}] {}",
                finding.severity,
                finding.location(),
                finding.category,
                finding.message
            ));
            if !finding.source.is_empty() {
                output.push_str(&format!(" ({})", finding.source));
            }
            output.push('\n');
            if let Some(suggestion) = &finding.suggestion {
                output.push_str(&format!("  - Suggestion: {}\n", suggestion.trim()));
            }
        }
        let omitted = review.findings.len().saturating_sub(report.max_findings);
        if omitted > 0 {
            output.push_str(&format!("\n_{} more finding(s) omitted._\n", omitted));
        }
    }

    if !report.fixes.is_empty() {
        output.push_str("\n## Auto-fixes\n\n");
        output.push_str(&format_fixes(report.fixes));
    }

    output.trim_end().to_string()
}

pub fn format_fixes(fixes: &[FixSuggestion]) -> String {
    let mut output = String::new();
    for fix in fixes {
        output.push_str(&format!(
            "### `{}:{}` ({}, confidence {})\n\n",
            fix.file,
            fix.line,
            fix.rule_id.as_deref().unwrap_or("manual"),
            fix.confidence
        ));
        let mut body = format!("-{}\n", fix.original_code);
        if !fix.is_deletion() {
            body.push_str(&format!("+{}\n", fix.fixed_code));
        }
        let backticks = get_fence_backticks(&body);
        output.push_str(&format!("{}diff\n{}{}\n\n", backticks, body, backticks));
    }
    output
}

/// Get appropriate number of backticks for Markdown code fence
/// Returns at least 3 backticks, or more if content contains backtick sequences
fn get_fence_backticks(content: &str) -> String {
    const MIN_BACKTICKS: usize = 3;
    let max_backticks = content
        .as_bytes()
        .split(|&b| b != b'`')
        .filter(|s| !s.is_empty())
        .map(|s| s.len())
        .max()
        .unwrap_or(0);
    "`".repeat((max_backticks + 1).max(MIN_BACKTICKS))
}
