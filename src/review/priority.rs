use crate::config::PriorityConfig;
use crate::types::Finding;
use std::cmp::Ordering;

/// Total order over findings: severity desc, category rank desc, file asc
///
/// Remaining ties fall through line (anchored before file-level), message,
/// source, rule id, raw category, suggestion and the blocking flag, so only
/// identical findings compare equal.
pub fn compare(a: &Finding, b: &Finding, config: &PriorityConfig) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| config.rank(&b.category).cmp(&config.rank(&a.category)))
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| match (a.line, b.line) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.suggestion.cmp(&b.suggestion))
        .then_with(|| b.blocking.cmp(&a.blocking))
}

pub fn prioritize(mut findings: Vec<Finding>, config: &PriorityConfig) -> Vec<Finding> {
    findings.sort_by(|a, b| compare(a, b, config));
    findings
}
