use super::autofix::FixProposal;
use super::worker::{AgentReport, ReviewAgent, ReviewContext};
use crate::rule::RuleSet;
use crate::types::{AgentRole, Finding};
use crate::util::diff::added_lines;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, trace};

pub const RULE_AGENT_NAME: &str = "rules";

/// Deterministic agent matching the rule set against lines added by the diff
#[derive(Debug, Clone)]
pub struct RuleAgent {
    rules: RuleSet,
}

impl RuleAgent {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// One finding per matching added line, with a fix proposal when the rule has a fix
    pub fn scan(&self, ctx: &ReviewContext) -> AgentReport {
        let mut report = AgentReport::default();

        // Changed-file order keeps output stable
        for file in &ctx.changed_files {
            let Some(diff) = ctx.diffs.get(file) else {
                continue;
            };
            let rules: Vec<_> = self.rules.for_file(file).collect();
            if rules.is_empty() {
                trace!("No rules apply to {}", file);
                continue;
            }

            for added in added_lines(diff) {
                for rule in rules.iter().filter(|r| r.matches(added.content)) {
                    let body = &rule.body;
                    let mut finding = Finding::new(file.as_str(), body.description.as_str())
                        .with_line(added.line)
                        .with_severity(body.severity)
                        .with_category(body.category.as_str())
                        .with_rule(body.id.as_str())
                        .with_source(RULE_AGENT_NAME);
                    if let Some(tip) = &body.tip {
                        finding = finding.with_suggestion(tip.as_str());
                    }
                    trace!("{} matched {}", body.id, finding.location());

                    if let Some(fixed) = rule.propose_fix(added.content) {
                        report.fixes.push(FixProposal {
                            finding: finding.clone(),
                            original_code: added.content.to_string(),
                            fixed_code: fixed,
                        });
                    }
                    report.findings.push(finding);
                }
            }
        }

        debug!(
            "Rule scan: {} findings, {} fix proposals",
            report.findings.len(),
            report.fixes.len()
        );
        report
    }
}

#[async_trait]
impl ReviewAgent for RuleAgent {
    fn name(&self) -> &str {
        RULE_AGENT_NAME
    }

    fn role(&self) -> AgentRole {
        AgentRole::Style
    }

    async fn review(&self, ctx: &ReviewContext) -> Result<AgentReport> {
        Ok(self.scan(ctx))
    }
}
