//! Auto-fix confidence estimation.
//!
//! Confidence starts at a neutral base and moves with a few categorical
//! signals plus the edit similarity between the original and fixed line.
//! A fix that cannot be evaluated yields `None`, never a zero confidence.

use crate::config::AutofixConfig;
use crate::rule::RuleSet;
use crate::types::{Finding, FixSuggestion, Severity};
use crate::util::similarity::similarity;
use std::cmp::Reverse;
use tracing::{debug, trace};

const BASE_CONFIDENCE: i32 = 50;
const STYLE_BONUS: i32 = 30;
const TRIVIAL_RULE_BONUS: i32 = 20;
const RISKY_QUALITY_PENALTY: i32 = -20;
const SIMILARITY_BONUS: i32 = 10;

/// A concrete line rewrite proposed for a finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixProposal {
    pub finding: Finding,
    pub original_code: String,
    /// Empty means delete the line
    pub fixed_code: String,
}

pub fn is_auto_fixable(finding: &Finding, config: &AutofixConfig) -> bool {
    config
        .categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&finding.category))
        || finding
            .rule_id
            .as_ref()
            .is_some_and(|id| config.rule_ids.contains(id))
}

/// Confidence (0..=100) that replacing `original` with `fixed` resolves `finding`
///
/// `None` when the finding is not auto-fixable or the fix changes nothing.
pub fn estimate_confidence(
    finding: &Finding,
    original: &str,
    fixed: &str,
    rules: &RuleSet,
    config: &AutofixConfig,
) -> Option<u8> {
    if !is_auto_fixable(finding, config) {
        trace!("{}: category '{}' not auto-fixable", finding.location(), finding.category);
        return None;
    }
    if original == fixed {
        trace!("{}: fix is identical to original", finding.location());
        return None;
    }

    let category = finding.category.to_ascii_lowercase();
    let mut confidence = BASE_CONFIDENCE;
    if category == "style" {
        confidence += STYLE_BONUS;
    }
    let trivial_match = finding
        .rule_id
        .as_deref()
        .and_then(|id| rules.get(id))
        .is_some_and(|rule| rule.body.trivial && rule.matches(original));
    if trivial_match {
        confidence += TRIVIAL_RULE_BONUS;
    }
    if category == "quality" && finding.severity == Severity::High {
        confidence += RISKY_QUALITY_PENALTY;
    }
    let similar = similarity(original, fixed);
    if similar > config.similarity_threshold {
        confidence += SIMILARITY_BONUS;
    }

    let confidence = confidence.clamp(0, 100) as u8;
    trace!(
        "{}: confidence {} (trivial rule {}, similarity {:.2})",
        finding.location(),
        confidence,
        trivial_match,
        similar
    );
    Some(confidence)
}

/// Estimate a fix against full file content, resolving the original line by number
///
/// `None` when the finding has no line or the line is outside `source`.
pub fn estimate_for_source(
    finding: &Finding,
    source: &str,
    fixed: &str,
    rules: &RuleSet,
    config: &AutofixConfig,
) -> Option<FixSuggestion> {
    let line = finding.line?;
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    let Some(original) = source.lines().nth(index) else {
        debug!("{}: line is out of bounds", finding.location());
        return None;
    };
    suggestion(finding, line, original, fixed, rules, config)
}

fn suggestion(
    finding: &Finding,
    line: u32,
    original: &str,
    fixed: &str,
    rules: &RuleSet,
    config: &AutofixConfig,
) -> Option<FixSuggestion> {
    let confidence = estimate_confidence(finding, original, fixed, rules, config)?;
    Some(FixSuggestion {
        file: finding.file.clone(),
        line,
        original_code: original.to_string(),
        fixed_code: fixed.to_string(),
        confidence,
        rule_id: finding.rule_id.clone(),
    })
}

/// Estimate every proposal and keep those at or above `config.min_confidence`
///
/// Ordered by confidence descending, then file and line.
pub fn collect_fixes(
    proposals: &[FixProposal],
    rules: &RuleSet,
    config: &AutofixConfig,
) -> Vec<FixSuggestion> {
    let mut fixes: Vec<FixSuggestion> = proposals
        .iter()
        .filter_map(|p| {
            let line = p.finding.line?;
            suggestion(&p.finding, line, &p.original_code, &p.fixed_code, rules, config)
        })
        .filter(|fix| fix.confidence >= config.min_confidence)
        .collect();
    fixes.sort_by(|a, b| {
        Reverse(a.confidence)
            .cmp(&Reverse(b.confidence))
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
    });
    debug!(
        "{} of {} fix proposal(s) reached confidence {}",
        fixes.len(),
        proposals.len(),
        config.min_confidence
    );
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console_finding() -> Finding {
        Finding::new("src/app.ts", "Console statement left in code")
            .with_line(2)
            .with_severity(Severity::Low)
            .with_category("style")
            .with_rule("no-console")
    }

    #[test]
    fn test_console_removal_is_high_confidence() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let finding = console_finding();

        // Deletion
        let deletion = estimate_confidence(&finding, "  console.log(user);", "", &rules, &config);
        assert!(deletion.is_some_and(|c| c >= 90));

        // Rewrite close to the original
        let rewrite = estimate_confidence(
            &finding,
            "  console.log(user);",
            "  logger.log(user);",
            &rules,
            &config,
        );
        assert_eq!(rewrite, Some(100));
    }

    #[test]
    fn test_risky_quality_fix_is_low_confidence() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let finding = Finding::new("src/db.ts", "Unbounded retry loop")
            .with_line(10)
            .with_severity(Severity::High)
            .with_category("quality");
        let original = "while (true) { retry(); }";
        let fixed = "return;";
        assert!(similarity(original, fixed) < 0.3);
        let confidence = estimate_confidence(&finding, original, fixed, &rules, &config);
        assert!(confidence.is_some_and(|c| c <= 40));
    }

    #[test]
    fn test_not_auto_fixable_category() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let finding = Finding::new("a.ts", "Hardcoded API key")
            .with_line(5)
            .with_category("security");
        assert_eq!(estimate_confidence(&finding, "a", "b", &rules, &config), None);
    }

    #[test]
    fn test_allow_listed_rule_overrides_category() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let finding = Finding::new("a.ts", "Magic number")
            .with_line(1)
            .with_category("performance")
            .with_rule("no-magic-numbers");
        assert!(estimate_confidence(&finding, "sleep(3600)", "sleep(ONE_HOUR)", &rules, &config).is_some());
    }

    #[test]
    fn test_identical_fix_is_rejected() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        assert_eq!(
            estimate_confidence(&console_finding(), "x", "x", &rules, &config),
            None
        );
    }

    #[test]
    fn test_trivial_bonus_requires_trigger_match() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let finding = console_finding();
        // Original does not contain a console call: style bonus only, low similarity
        let confidence = estimate_confidence(&finding, "let a = 1;", "", &rules, &config);
        assert_eq!(confidence, Some(80));
    }

    #[test]
    fn test_estimate_for_source_bounds() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let source = "import x from 'y';\n  console.log(user);\nexport default x;\n";

        let fix = estimate_for_source(&console_finding(), source, "", &rules, &config);
        let fix = fix.unwrap();
        assert_eq!(fix.original_code, "  console.log(user);");
        assert!(fix.is_deletion());
        assert_eq!(fix.rule_id.as_deref(), Some("no-console"));

        let out_of_bounds = console_finding().with_line(40);
        assert_eq!(estimate_for_source(&out_of_bounds, source, "", &rules, &config), None);

        let mut unanchored = console_finding();
        unanchored.line = None;
        assert_eq!(estimate_for_source(&unanchored, source, "", &rules, &config), None);
    }

    #[test]
    fn test_collect_fixes_filters_and_orders() {
        let rules = RuleSet::builtin();
        let config = AutofixConfig::default();
        let proposals = vec![
            FixProposal {
                finding: Finding::new("src/b.ts", "Empty catch block swallows errors")
                    .with_line(7)
                    .with_category("quality")
                    .with_rule("no-empty-catch"),
                original_code: "} catch (e) {}".into(),
                fixed_code: "} catch (e) { /* intentionally ignored */ }".into(),
            },
            FixProposal {
                finding: console_finding().with_line(9),
                original_code: "console.debug(state);".into(),
                fixed_code: String::new(),
            },
            FixProposal {
                finding: console_finding().with_line(3).with_suggestion("drop it"),
                original_code: "console.log(a);".into(),
                fixed_code: String::new(),
            },
        ];
        let fixes = collect_fixes(&proposals, &rules, &config);
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].line, 3);
        assert_eq!(fixes[1].line, 9);
        assert!(fixes.iter().all(|f| f.confidence >= config.min_confidence));

        let permissive = AutofixConfig {
            min_confidence: 0,
            ..AutofixConfig::default()
        };
        assert_eq!(collect_fixes(&proposals, &rules, &permissive).len(), 3);
    }
}
