use crate::config::DedupConfig;
use crate::types::Finding;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, trace};

/// `(file, line, message prefix)`; two findings with equal fingerprints describe the same issue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub file: String,
    pub line: Option<u32>,
    pub prefix: String,
}

/// First `n` chars of `s`
fn char_prefix(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or(s, |(i, _)| &s[..i])
}

/// Fingerprint a finding; line-anchored findings compare a shorter prefix since
/// the location already pins the issue down
pub fn fingerprint(finding: &Finding, config: &DedupConfig) -> Fingerprint {
    let n = match finding.line {
        Some(_) => config.anchored_prefix_chars,
        None => config.prefix_chars,
    };
    Fingerprint {
        file: finding.file.clone(),
        line: finding.line,
        prefix: char_prefix(&finding.message, n).to_string(),
    }
}

/// Merge findings that share a fingerprint
///
/// On collision the strictly higher severity replaces the kept finding in its
/// original position; on a tie the first one encountered stays. Input order
/// (agent registration order) therefore decides which `source` and
/// `suggestion` survive.
pub fn deduplicate(findings: Vec<Finding>, config: &DedupConfig) -> Vec<Finding> {
    let total = findings.len();
    let mut kept: Vec<Finding> = Vec::with_capacity(total);
    let mut index: HashMap<Fingerprint, usize> = HashMap::with_capacity(total);

    for finding in findings {
        match index.entry(fingerprint(&finding, config)) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(finding);
            }
            Entry::Occupied(slot) => {
                let existing = &mut kept[*slot.get()];
                if finding.severity > existing.severity {
                    trace!(
                        "{}: '{}' ({}) supersedes '{}' ({})",
                        finding.location(),
                        finding.source,
                        finding.severity,
                        existing.source,
                        existing.severity
                    );
                    *existing = finding;
                } else {
                    trace!(
                        "{}: dropping duplicate from '{}'",
                        finding.location(),
                        finding.source
                    );
                }
            }
        }
    }

    if kept.len() < total {
        debug!("Deduplicated {} findings into {}", total, kept.len());
    }
    kept
}
