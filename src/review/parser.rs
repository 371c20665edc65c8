//! Normalizes raw agent output into [`Finding`] records.
//!
//! Decoders run from strict to loose: JSON, then `FILE:`/`MESSAGE:` marker
//! blocks, then bullet lists. The first decoder that recognizes its format
//! wins, even if every record it produced is later dropped.

use crate::types::{Finding, Severity, default_category};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

const FILE_FIELD: &str = "FILE:";
const LINE_FIELD: &str = "LINE:";
const SEVERITY_FIELD: &str = "SEVERITY:";
const CATEGORY_FIELD: &str = "CATEGORY:";
const MESSAGE_FIELD: &str = "MESSAGE:";
const SUGGESTION_FIELD: &str = "SUGGESTION:";
const RULE_FIELD: &str = "RULE:";
const SCORE_FIELD: &str = "SCORE:";

/// Object keys that may hold the findings array
const ARRAY_FIELDS: [&str; 4] = ["comments", "findings", "issues", "suggestions"];
/// Object keys that may hold the agent self-score
const SCORE_FIELDS: [&str; 2] = ["score", "overallScore"];

/// Which decoder recognized the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Structured,
    Bullets,
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub format: OutputFormat,
    pub findings: Vec<Finding>,
    /// Self-score reported by the agent, if any
    pub score: Option<u8>,
    /// Records recognized but dropped for missing `file` or `message`
    pub dropped: usize,
}

/// A record before validation
#[derive(Debug, Default)]
struct Candidate {
    file: Option<String>,
    line: Option<u32>,
    message: Option<String>,
    severity: Option<String>,
    category: Option<String>,
    suggestion: Option<String>,
    rule_id: Option<String>,
    blocking: bool,
}

struct Decoded {
    candidates: Vec<Candidate>,
    score: Option<u8>,
}

type Decoder = fn(&str) -> Option<Decoded>;

const DECODERS: [(OutputFormat, Decoder); 3] = [
    (OutputFormat::Json, decode_json),
    (OutputFormat::Structured, decode_structured),
    (OutputFormat::Bullets, decode_bullets),
];

/// Parse raw agent output into findings stamped with `source`
pub fn parse(raw: &str, source: &str) -> Vec<Finding> {
    parse_output(raw, source).findings
}

/// Parse raw agent output, keeping the detected format and self-score
///
/// Never fails: unrecognized input yields no findings.
pub fn parse_output(raw: &str, source: &str) -> ParsedOutput {
    let Some((format, decoded)) = DECODERS
        .iter()
        .find_map(|(format, decode)| decode(raw).map(|d| (*format, d)))
    else {
        if !raw.trim().is_empty() {
            warn!("Could not recognize output from '{}', no findings extracted", source);
        }
        return ParsedOutput {
            format: OutputFormat::Unrecognized,
            findings: Vec::new(),
            score: None,
            dropped: 0,
        };
    };
    debug!(
        "Decoded {} candidate(s) from '{}' as {:?}",
        decoded.candidates.len(),
        source,
        format
    );

    let total = decoded.candidates.len();
    let findings: Vec<Finding> = decoded
        .candidates
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| validate(c, source, i))
        .collect();

    ParsedOutput {
        format,
        dropped: total - findings.len(),
        findings,
        score: decoded.score,
    }
}

fn validate(candidate: Candidate, source: &str, index: usize) -> Option<Finding> {
    let file = non_empty(candidate.file);
    let message = non_empty(candidate.message);
    let (Some(file), Some(message)) = (file, message) else {
        warn!(
            "Dropping record #{} from '{}': missing file or message",
            index, source
        );
        return None;
    };

    let severity = match candidate.severity.as_deref() {
        None => Severity::default(),
        Some(raw) => Severity::parse_lenient(raw).unwrap_or_else(|| {
            debug!("Unknown severity '{}' from '{}', using medium", raw, source);
            Severity::default()
        }),
    };
    let category = non_empty(candidate.category)
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or_else(default_category);

    Some(Finding {
        file,
        line: candidate.line,
        message,
        severity,
        category,
        suggestion: non_empty(candidate.suggestion),
        source: source.to_string(),
        rule_id: non_empty(candidate.rule_id),
        blocking: candidate.blocking,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Leading digits of a line reference ("42", "42-45", "L42" is rejected); zero is no line
fn parse_line(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|line| *line > 0)
}

fn clamp_score(value: f64) -> Option<u8> {
    value.is_finite().then(|| value.clamp(0.0, 100.0).round() as u8)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn decode_json(raw: &str) -> Option<Decoded> {
    let text = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return decode_json_value(value);
    }

    // Models often wrap the payload in prose; retry on the outermost brackets.
    // Only a payload carrying records or a score counts here, so prose like
    // "returns []" still reaches the text decoders.
    [('[', ']'), ('{', '}')].into_iter().find_map(|(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if start >= end {
            return None;
        }
        let value = serde_json::from_str::<Value>(&text[start..=end]).ok()?;
        let decoded = decode_json_value(value)
            .filter(|d| !d.candidates.is_empty() || d.score.is_some())?;
        trace!("Recovered embedded JSON at bytes {}..={}", start, end);
        Some(decoded)
    })
}

fn decode_json_value(value: Value) -> Option<Decoded> {
    match value {
        Value::Array(items) => decode_json_array(items, None),
        Value::Object(obj) => {
            let score = SCORE_FIELDS
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_f64))
                .and_then(clamp_score);
            if let Some(items) = ARRAY_FIELDS
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
            {
                return decode_json_array(items.clone(), score);
            }
            if obj.contains_key("message") {
                return Some(Decoded {
                    candidates: vec![candidate_from_object(&obj)],
                    score,
                });
            }
            score.map(|score| Decoded {
                candidates: Vec::new(),
                score: Some(score),
            })
        }
        _ => None,
    }
}

fn decode_json_array(items: Vec<Value>, score: Option<u8>) -> Option<Decoded> {
    // A non-empty array without a single object is not a findings list
    if !items.is_empty() && !items.iter().any(Value::is_object) {
        return None;
    }
    let candidates = items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => candidate_from_object(obj),
            _ => Candidate::default(),
        })
        .collect();
    Some(Decoded { candidates, score })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn candidate_from_object(obj: &Map<String, Value>) -> Candidate {
    let line = ["line", "startLine", "start_line"]
        .iter()
        .find_map(|key| match obj.get(*key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => parse_line(s),
            _ => None,
        })
        .filter(|line| *line > 0);

    Candidate {
        file: string_field(obj, &["file", "path", "filename"]),
        line,
        message: string_field(obj, &["message", "comment", "description", "body"]),
        severity: string_field(obj, &["severity", "level", "priority"]),
        category: string_field(obj, &["category", "type"]),
        suggestion: string_field(obj, &["suggestion", "fix", "recommendation"]),
        rule_id: string_field(obj, &["ruleId", "rule_id", "rule"]),
        blocking: obj
            .get("blocking")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

#[derive(Clone, Copy)]
enum TextField {
    Message,
    Suggestion,
    Other,
}

fn decode_structured(raw: &str) -> Option<Decoded> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut score = None;
    let mut last = TextField::Other;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix(FILE_FIELD) {
            candidates.push(Candidate {
                file: Some(value.trim().to_string()),
                ..Candidate::default()
            });
            last = TextField::Other;
            continue;
        }
        if let Some(value) = trimmed.strip_prefix(SCORE_FIELD) {
            score = value.trim().parse::<f64>().ok().and_then(clamp_score);
            continue;
        }
        let Some(current) = candidates.last_mut() else {
            continue;
        };

        if let Some(value) = trimmed.strip_prefix(LINE_FIELD) {
            current.line = parse_line(value);
            last = TextField::Other;
        } else if let Some(value) = trimmed.strip_prefix(SEVERITY_FIELD) {
            current.severity = Some(value.trim().to_string());
            last = TextField::Other;
        } else if let Some(value) = trimmed.strip_prefix(CATEGORY_FIELD) {
            current.category = Some(value.trim().to_string());
            last = TextField::Other;
        } else if let Some(value) = trimmed.strip_prefix(RULE_FIELD) {
            current.rule_id = Some(value.trim().to_string());
            last = TextField::Other;
        } else if let Some(value) = trimmed.strip_prefix(MESSAGE_FIELD) {
            current.message = Some(value.trim().to_string());
            last = TextField::Message;
        } else if let Some(value) = trimmed.strip_prefix(SUGGESTION_FIELD) {
            current.suggestion = Some(value.trim().to_string());
            last = TextField::Suggestion;
        } else if !trimmed.is_empty() {
            // Continuation of a wrapped message or suggestion
            let target = match last {
                TextField::Message => current.message.as_mut(),
                TextField::Suggestion => current.suggestion.as_mut(),
                TextField::Other => None,
            };
            if let Some(text) = target {
                text.push(' ');
                text.push_str(trimmed);
            }
        }
    }

    (!candidates.is_empty()).then_some(Decoded { candidates, score })
}

fn decode_bullets(raw: &str) -> Option<Decoded> {
    let candidates: Vec<Candidate> = raw
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let rest = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('*'))?;
            // "---" rules and "**bold**" lines are not bullets
            if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
                return None;
            }
            Some(Candidate {
                file: Some(default_category()),
                message: Some(rest.trim().to_string()),
                ..Candidate::default()
            })
        })
        .collect();

    (!candidates.is_empty()).then_some(Decoded {
        candidates,
        score: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array() {
        let raw = r#"[
            {"file": "src/a.ts", "line": 5, "message": "Hardcoded API key", "severity": "critical", "category": "Security"},
            {"file": "src/b.ts", "message": "Long function", "suggestion": "Split it"}
        ]"#;
        let parsed = parse_output(raw, "security");
        assert_eq!(parsed.format, OutputFormat::Json);
        assert_eq!(parsed.findings.len(), 2);

        let first = &parsed.findings[0];
        assert_eq!(first.line, Some(5));
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.category, "security");
        assert_eq!(first.source, "security");

        let second = &parsed.findings[1];
        assert_eq!(second.severity, Severity::Medium);
        assert_eq!(second.category, "general");
        assert_eq!(second.suggestion.as_deref(), Some("Split it"));
    }

    #[test]
    fn test_json_object_with_comments_and_score() {
        let raw = r#"```json
{"score": 72, "comments": [{"path": "lib.rs", "line": "12-14", "comment": "Unchecked index", "severity": "high"}]}
```"#;
        let parsed = parse_output(raw, "quality");
        assert_eq!(parsed.format, OutputFormat::Json);
        assert_eq!(parsed.score, Some(72));
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].file, "lib.rs");
        assert_eq!(parsed.findings[0].line, Some(12));
        assert_eq!(parsed.findings[0].message, "Unchecked index");
    }

    #[test]
    fn test_json_alternate_array_fields() {
        for key in ["findings", "issues", "suggestions"] {
            let raw = format!(r#"{{"{}": [{{"file": "a.rs", "message": "m"}}]}}"#, key);
            assert_eq!(parse(&raw, "x").len(), 1, "key {}", key);
        }
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let raw = "Here is my review:\n[{\"file\": \"a.py\", \"message\": \"SQL built by concatenation\"}]\nThanks!";
        let findings = parse(raw, "security");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "a.py");
    }

    #[test]
    fn test_json_drops_invalid_records() {
        let raw = r#"[{"file": "a.rs"}, {"message": "no file"}, {"file": " ", "message": "blank"}, 3, {"file": "b.rs", "message": "ok"}]"#;
        let parsed = parse_output(raw, "x");
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.dropped, 4);
    }

    #[test]
    fn test_empty_json_array_means_no_findings() {
        let parsed = parse_output("[]", "x");
        assert_eq!(parsed.format, OutputFormat::Json);
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_zero_line_is_unanchored() {
        let findings = parse(r#"[{"file": "a.rs", "line": 0, "message": "m"}]"#, "x");
        assert_eq!(findings[0].line, None);
    }

    #[test]
    fn test_structured_text() {
        let raw = "Review notes\n\
                   SCORE: 64\n\
                   FILE: src/db.rs\n\
                   LINE: 88\n\
                   SEVERITY: high\n\
                   CATEGORY: database\n\
                   MESSAGE: Query inside a loop\n\
                   issues one round trip per row\n\
                   SUGGESTION: Batch the lookups\n\
                   \n\
                   FILE: src/api.rs\n\
                   MESSAGE: Missing input validation\n";
        let parsed = parse_output(raw, "performance");
        assert_eq!(parsed.format, OutputFormat::Structured);
        assert_eq!(parsed.score, Some(64));
        assert_eq!(parsed.findings.len(), 2);

        let first = &parsed.findings[0];
        assert_eq!(first.file, "src/db.rs");
        assert_eq!(first.line, Some(88));
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.category, "database");
        assert_eq!(
            first.message,
            "Query inside a loop issues one round trip per row"
        );
        assert_eq!(first.suggestion.as_deref(), Some("Batch the lookups"));

        let second = &parsed.findings[1];
        assert_eq!(second.line, None);
        assert_eq!(second.severity, Severity::Medium);
    }

    #[test]
    fn test_structured_block_without_message_is_dropped() {
        let parsed = parse_output("FILE: a.rs\nLINE: 3\n", "x");
        assert_eq!(parsed.format, OutputFormat::Structured);
        assert!(parsed.findings.is_empty());
        assert_eq!(parsed.dropped, 1);
    }

    #[test]
    fn test_bullets() {
        let raw = "Overall fine.\n\n- Consider adding tests\n* Rename `tmp`\n---\n**Summary**\n-\n";
        let parsed = parse_output(raw, "Linus persona");
        assert_eq!(parsed.format, OutputFormat::Bullets);
        assert_eq!(parsed.findings.len(), 2);
        assert_eq!(parsed.dropped, 1);
        for finding in &parsed.findings {
            assert_eq!(finding.file, "general");
            assert_eq!(finding.category, "general");
            assert_eq!(finding.severity, Severity::Medium);
            assert_eq!(finding.line, None);
        }
        assert_eq!(parsed.findings[1].message, "Rename `tmp`");
    }

    #[test]
    fn test_bracketed_prose_falls_through_to_bullets() {
        let findings = parse("- index items[0] may panic", "x");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "index items[0] may panic");
    }

    #[test]
    fn test_empty_brackets_in_structured_text() {
        let raw = "FILE: src/a.ts\nLINE: 3\nMESSAGE: function returns [] when input is empty\n";
        let parsed = parse_output(raw, "x");
        assert_eq!(parsed.format, OutputFormat::Structured);
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(
            parsed.findings[0].message,
            "function returns [] when input is empty"
        );
    }

    #[test]
    fn test_empty_brackets_in_bullets() {
        let parsed = parse_output("- prefer `vec![]` over Vec::new()\n- rename tmp\n", "x");
        assert_eq!(parsed.format, OutputFormat::Bullets);
        assert_eq!(parsed.findings.len(), 2);
        assert_eq!(parsed.findings[0].message, "prefer `vec![]` over Vec::new()");
    }

    #[test]
    fn test_embedded_empty_object_with_score() {
        let parsed = parse_output("Verdict below\n{\"findings\": [], \"score\": 95}\n", "x");
        assert_eq!(parsed.format, OutputFormat::Json);
        assert_eq!(parsed.score, Some(95));
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_unrecognized_input() {
        for raw in ["", "   ", "LGTM, nothing to add.", "{not json"] {
            let parsed = parse_output(raw, "x");
            assert_eq!(parsed.format, OutputFormat::Unrecognized, "input {:?}", raw);
            assert!(parsed.findings.is_empty());
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  [1] "), "[1]");
    }
}
