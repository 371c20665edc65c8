pub mod autofix;
pub mod dedup;
pub mod orchestrator;
pub mod parser;
pub mod priority;
pub mod render;
pub mod risk;
pub mod rules_agent;
pub mod score;
pub mod verdict;
pub mod worker;

use crate::config::Config;
use crate::types::{AggregatedReview, FindingSet, RiskLevel};
use std::collections::BTreeMap;
use tracing::info;

/// Merge agent finding sets into one review
///
/// Findings are concatenated in agent order, deduplicated, then prioritized.
/// The overall score is the role-weighted mean of agent scores, so failed
/// agents count as passing. Pure: identical inputs give identical output.
pub fn aggregate(sets: &[FindingSet], risk: RiskLevel, config: &Config) -> AggregatedReview {
    let all = sets.iter().flat_map(|s| s.findings.iter().cloned()).collect();
    let deduped = dedup::deduplicate(all, &config.dedup);
    let findings = priority::prioritize(deduped, &config.priority);

    let overall_score = score::weighted_score(sets, &config.scoring.roles);
    let verdict = verdict::resolve_verdict(&findings, overall_score, risk, &config.verdict);

    let mut per_category_counts = BTreeMap::new();
    for finding in &findings {
        *per_category_counts
            .entry(finding.category.to_ascii_lowercase())
            .or_insert(0) += 1;
    }

    info!(
        "Aggregated {} agent(s): {} findings, score {}, {}",
        sets.len(),
        findings.len(),
        overall_score,
        verdict
    );
    AggregatedReview {
        findings,
        overall_score,
        verdict,
        per_category_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::types::{AgentRole, Finding, Severity, Verdict};

    fn agent(name: &str, role: AgentRole, findings: Vec<Finding>) -> FindingSet {
        let findings: Vec<Finding> = findings.into_iter().map(|f| f.with_source(name)).collect();
        let score = score::agent_score(&findings, role, &ScoringConfig::default());
        FindingSet::new(name, role, score, findings, 10)
    }

    #[test]
    fn test_duplicate_api_key_collapses_and_blocks() {
        let config = Config::default();
        let sets = vec![
            agent(
                "Security Agent",
                AgentRole::Security,
                vec![
                    Finding::new("a.ts", "Hardcoded API key detected in config")
                        .with_line(5)
                        .with_severity(Severity::High)
                        .with_category("security"),
                ],
            ),
            agent(
                "Quality Agent",
                AgentRole::Quality,
                vec![
                    Finding::new("b.ts", "Function is too long")
                        .with_line(40)
                        .with_severity(Severity::Medium)
                        .with_category("complexity"),
                    Finding::new("a.ts", "Hardcoded API key detected — move to env")
                        .with_line(5)
                        .with_severity(Severity::Medium)
                        .with_category("quality"),
                ],
            ),
        ];

        let review = aggregate(&sets, RiskLevel::Low, &config);
        let on_key: Vec<_> = review
            .findings
            .iter()
            .filter(|f| f.file == "a.ts" && f.line == Some(5))
            .collect();
        assert_eq!(on_key.len(), 1);
        assert_eq!(on_key[0].severity, Severity::High);
        assert_eq!(on_key[0].source, "Security Agent");
        assert_eq!(review.findings[0].file, "a.ts");
        assert_eq!(review.findings.len(), 2);
        assert_eq!(review.verdict, Verdict::RequestChanges);
        assert_eq!(review.per_category_counts.get("security"), Some(&1));
        assert_eq!(review.per_category_counts.get("quality"), None);
    }

    #[test]
    fn test_empty_diff_approves() {
        let config = Config::default();
        let sets = vec![
            agent("Security Agent", AgentRole::Security, vec![]),
            agent("Quality Agent", AgentRole::Quality, vec![]),
        ];
        let review = aggregate(&sets, RiskLevel::Low, &config);
        assert!(review.findings.is_empty());
        assert_eq!(review.overall_score, 100);
        assert_eq!(review.verdict, Verdict::Approve);
        assert!(review.per_category_counts.is_empty());
    }

    #[test]
    fn test_zero_agents_approves() {
        let review = aggregate(&[], RiskLevel::Low, &Config::default());
        assert_eq!(review.overall_score, 100);
        assert_eq!(review.verdict, Verdict::Approve);
    }

    #[test]
    fn test_failed_agent_does_not_drag_score() {
        let config = Config::default();
        let sets = vec![
            FindingSet::failed("Security Agent", AgentRole::Security, 120_000),
            agent("Quality Agent", AgentRole::Quality, vec![]),
        ];
        let review = aggregate(&sets, RiskLevel::Low, &config);
        assert_eq!(review.overall_score, 100);
        assert_eq!(review.verdict, Verdict::Approve);
    }

    #[test]
    fn test_low_score_without_blockers_comments() {
        let config = Config::default();
        let findings: Vec<Finding> = (0..4)
            .map(|i| {
                Finding::new("src/hot.rs", format!("Allocation in hot loop #{}", i))
                    .with_line(10 + i)
                    .with_severity(Severity::Medium)
                    .with_category("memory")
            })
            .collect();
        let sets = vec![agent("Performance Agent", AgentRole::Performance, findings)];
        let review = aggregate(&sets, RiskLevel::Low, &config);
        // 100 - 4 * 15 * 1.2
        assert_eq!(review.overall_score, 28);
        assert_eq!(review.verdict, Verdict::Comment);
        assert_eq!(review.per_category_counts.get("memory"), Some(&4));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let config = Config::default();
        let sets = vec![
            agent(
                "a",
                AgentRole::Style,
                vec![Finding::new("x.rs", "nit").with_severity(Severity::Low)],
            ),
            agent(
                "b",
                AgentRole::Testing,
                vec![Finding::new("y.rs", "missing test").with_line(1)],
            ),
        ];
        assert_eq!(
            aggregate(&sets, RiskLevel::Medium, &config),
            aggregate(&sets, RiskLevel::Medium, &config)
        );
    }

    #[test]
    fn test_score_bounds_hold_for_harsh_input() {
        let config = Config::default();
        let findings: Vec<Finding> = (0..50)
            .map(|i| {
                Finding::new("z.rs", format!("issue {}", i))
                    .with_severity(Severity::High)
                    .with_category("algorithm")
            })
            .collect();
        let sets = vec![
            agent("Performance Agent", AgentRole::Performance, findings.clone()),
            agent("Style Agent", AgentRole::Style, findings),
        ];
        let review = aggregate(&sets, RiskLevel::Low, &config);
        assert_eq!(review.overall_score, 0);
        assert_eq!(review.findings.len(), 50);
    }
}
