use crate::config::VerdictConfig;
use crate::types::{Finding, RiskLevel, Verdict};
use tracing::debug;

/// Why a review must request changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// A finding in a blocking category at or above the blocking severity
    BlockingCategory { location: String, category: String },
    /// An agent flagged a finding as merge-blocking
    FlaggedByAgent { location: String, source: String },
    HighRisk,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockingCategory { location, category } => {
                write!(f, "{} finding at {}", category, location)
            }
            Self::FlaggedByAgent { location, source } => {
                write!(f, "{} flagged {} as blocking", source, location)
            }
            Self::HighRisk => f.write_str("change set assessed as high risk"),
        }
    }
}

pub fn block_reasons(findings: &[Finding], risk: RiskLevel, config: &VerdictConfig) -> Vec<BlockReason> {
    let mut reasons = Vec::new();
    for finding in findings {
        if finding.blocking {
            reasons.push(BlockReason::FlaggedByAgent {
                location: finding.location(),
                source: finding.source.clone(),
            });
        }
        let blocking_category = config
            .blocking_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&finding.category));
        if blocking_category && finding.severity >= config.blocking_severity {
            reasons.push(BlockReason::BlockingCategory {
                location: finding.location(),
                category: finding.category.clone(),
            });
        }
    }
    if risk == RiskLevel::High && config.block_on_high_risk {
        reasons.push(BlockReason::HighRisk);
    }
    reasons
}

pub fn resolve_verdict(
    findings: &[Finding],
    overall_score: u8,
    risk: RiskLevel,
    config: &VerdictConfig,
) -> Verdict {
    let reasons = block_reasons(findings, risk, config);
    if let Some(first) = reasons.first() {
        debug!("Requesting changes ({} reason(s)), first: {}", reasons.len(), first);
        return Verdict::RequestChanges;
    }
    if overall_score >= config.approve_threshold {
        Verdict::Approve
    } else {
        Verdict::Comment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn test_high_security_finding_requests_changes() {
        let config = VerdictConfig::default();
        let findings = vec![
            Finding::new("a.ts", "Hardcoded secret")
                .with_line(5)
                .with_severity(Severity::High)
                .with_category("Security"),
        ];
        assert_eq!(
            resolve_verdict(&findings, 100, RiskLevel::Low, &config),
            Verdict::RequestChanges
        );
    }

    #[test]
    fn test_medium_security_finding_does_not_block() {
        let config = VerdictConfig::default();
        let findings = vec![
            Finding::new("a.ts", "Weak hash")
                .with_severity(Severity::Medium)
                .with_category("security"),
        ];
        assert_eq!(
            resolve_verdict(&findings, 90, RiskLevel::Low, &config),
            Verdict::Approve
        );
    }

    #[test]
    fn test_high_risk_requests_changes() {
        let config = VerdictConfig::default();
        assert_eq!(
            resolve_verdict(&[], 100, RiskLevel::High, &config),
            Verdict::RequestChanges
        );
        let lenient = VerdictConfig {
            block_on_high_risk: false,
            ..VerdictConfig::default()
        };
        assert_eq!(
            resolve_verdict(&[], 100, RiskLevel::High, &lenient),
            Verdict::Approve
        );
    }

    #[test]
    fn test_agent_flagged_blocking() {
        let config = VerdictConfig::default();
        let mut finding = Finding::new("general", "Breaks public API").with_source("Linus persona");
        finding.blocking = true;
        let reasons = block_reasons(&[finding], RiskLevel::Low, &config);
        assert_eq!(
            reasons,
            vec![BlockReason::FlaggedByAgent {
                location: "general".into(),
                source: "Linus persona".into(),
            }]
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let config = VerdictConfig::default();
        assert_eq!(resolve_verdict(&[], 85, RiskLevel::Medium, &config), Verdict::Approve);
        assert_eq!(resolve_verdict(&[], 84, RiskLevel::Low, &config), Verdict::Comment);
    }

    #[test]
    fn test_custom_blocking_policy() {
        let config = VerdictConfig {
            approve_threshold: 95,
            blocking_categories: vec!["security".into(), "database".into()],
            blocking_severity: Severity::Medium,
            block_on_high_risk: true,
        };
        let findings = vec![
            Finding::new("m.sql", "Missing index")
                .with_severity(Severity::Medium)
                .with_category("database"),
        ];
        assert_eq!(
            resolve_verdict(&findings, 99, RiskLevel::Low, &config),
            Verdict::RequestChanges
        );
        assert_eq!(resolve_verdict(&[], 90, RiskLevel::Low, &config), Verdict::Comment);
    }
}
