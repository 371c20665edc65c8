use crate::config::{RoleWeights, ScoringConfig, SeverityWeights};
use crate::types::{AgentRole, Finding, FindingSet};
use tracing::{debug, warn};

const MAX_SCORE: f64 = 100.0;

/// `100 - Σ severityWeight × categoryMultiplier`, clamped to 0..=100
pub fn deduction_score(findings: &[Finding], weights: &SeverityWeights, scoring: &ScoringConfig) -> u8 {
    let deducted: f64 = findings
        .iter()
        .map(|f| weights.weight(f.severity) * scoring.category_multiplier(&f.category))
        .sum();
    (MAX_SCORE - deducted).clamp(0.0, MAX_SCORE).round() as u8
}

/// Deduction score using the severity profile of `role`
pub fn agent_score(findings: &[Finding], role: AgentRole, scoring: &ScoringConfig) -> u8 {
    deduction_score(findings, scoring.profiles.for_role(role), scoring)
}

/// Role-weighted mean of agent scores, renormalized over the agents present
///
/// No agents scores 100. If every present role has zero weight the plain mean is used.
pub fn weighted_score(sets: &[FindingSet], roles: &RoleWeights) -> u8 {
    if sets.is_empty() {
        return MAX_SCORE as u8;
    }

    let total_weight: f64 = sets.iter().map(|s| roles.weight(s.role)).sum();
    let mean = if total_weight > 0.0 {
        sets.iter()
            .map(|s| f64::from(s.score) * roles.weight(s.role))
            .sum::<f64>()
            / total_weight
    } else {
        warn!("All agent role weights are zero, using unweighted mean");
        sets.iter().map(|s| f64::from(s.score)).sum::<f64>() / sets.len() as f64
    };

    let score = mean.clamp(0.0, MAX_SCORE).round() as u8;
    debug!(
        "Weighted score {} over {} agent(s) (total weight {:.2})",
        score,
        sets.len(),
        total_weight
    );
    score
}
