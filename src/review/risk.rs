use crate::config::RiskConfig;
use crate::types::RiskLevel;
use crate::util::build_globset;
use crate::util::diff::changed_line_count;
use std::collections::HashMap;
use tracing::{debug, info};

/// Risk of a change set from the paths it touches and its size
pub fn assess_risk(
    changed_files: &[String],
    diffs: &HashMap<String, String>,
    config: &RiskConfig,
) -> RiskLevel {
    let sensitive = build_globset(&config.sensitive_paths, "risk.sensitive_paths");
    if let Some(file) = changed_files.iter().find(|f| sensitive.is_match(f.as_str())) {
        info!("High risk: sensitive path {} changed", file);
        return RiskLevel::High;
    }

    let changed_lines: usize = diffs.values().map(|d| changed_line_count(d)).sum();
    debug!(
        "Change set: {} file(s), {} changed line(s)",
        changed_files.len(),
        changed_lines
    );

    if changed_lines >= config.high_changed_lines {
        RiskLevel::High
    } else if changed_lines >= config.medium_changed_lines
        || changed_files.len() >= config.medium_changed_files
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
