use crate::types::Severity;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RuleBody {
    /// Stable identifier copied into findings as `ruleId`
    pub id: String,
    /// Message attached to every finding the rule produces
    pub description: String,
    /// Finding category (optional, defaults to "quality")
    #[serde(default = "default_category")]
    pub category: String,
    /// Finding severity (optional, defaults to "medium")
    #[serde(default)]
    pub severity: Severity,
    /// Regex matched against each added line of the diff
    pub pattern: String,
    /// Glob patterns to match files this rule applies to (optional, defaults to ["**/*"])
    #[serde(default = "default_scope")]
    pub scope: Vec<String>,
    /// Glob patterns to exclude from the matched scope (optional, defaults to [])
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Mechanical rule: a line matching `pattern` is reliably fixed by `fix`
    #[serde(default)]
    pub trivial: bool,
    /// Automatic fix applied to a matching line (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixAction>,
    /// Suggestion attached to findings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

/// How a rule rewrites a matching line
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    /// Remove the whole line
    Delete,
    /// Replace every match of the rule pattern (supports `$1` captures)
    Replace(String),
}

fn default_category() -> String {
    "quality".to_string()
}

pub fn default_scope() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_non_code_exclude() -> Vec<String> {
    vec![
        "**/*.md".into(),
        "**/*.toml".into(),
        "**/*.json".into(),
        "**/*.yaml".into(),
        "**/*.yml".into(),
        "**/*.xml".into(),
        "**/*.lock".into(),
        "**/*ignore".into(),
    ]
}

fn default_test_exclude() -> Vec<String> {
    vec![
        "**/*.test.*".into(),
        "**/*.spec.*".into(),
        "**/tests/**".into(),
        "**/__tests__/**".into(),
    ]
}

impl RuleBody {
    pub fn no_console() -> Self {
        Self {
            id: "no-console".into(),
            description: "Console statement left in code".into(),
            category: "style".into(),
            severity: Severity::Low,
            pattern: r"\bconsole\.(log|debug|info|trace|dir)\s*\(".into(),
            scope: vec!["**/*.{js,jsx,ts,tsx,mjs,cjs}".into()],
            exclude: default_test_exclude(),
            trivial: true,
            fix: Some(FixAction::Delete),
            tip: Some("Remove the statement or route it through the project logger.".into()),
        }
    }

    pub fn no_magic_numbers() -> Self {
        Self {
            id: "no-magic-numbers".into(),
            description: "Unexplained numeric literal".into(),
            category: "quality".into(),
            severity: Severity::Low,
            // Literals of 3+ digits used as operands; indexes and 0/1 stay quiet
            pattern: r"(?:[=<>+\-*/%(,]|\breturn)\s*-?\d{3,}(?:\.\d+)?\b".into(),
            scope: default_scope(),
            exclude: [default_non_code_exclude(), default_test_exclude()].concat(),
            trivial: false,
            fix: None,
            tip: Some("Extract the value into a named constant.".into()),
        }
    }

    pub fn no_empty_catch() -> Self {
        Self {
            id: "no-empty-catch".into(),
            description: "Empty catch block swallows errors".into(),
            category: "quality".into(),
            severity: Severity::Medium,
            pattern: r"catch(\s*\([^)]*\))?\s*\{\s*\}".into(),
            scope: default_scope(),
            exclude: default_non_code_exclude(),
            trivial: false,
            fix: Some(FixAction::Replace(
                "catch${1} { /* intentionally ignored */ }".into(),
            )),
            tip: Some("Handle the error or document why it is safe to ignore.".into()),
        }
    }

    pub fn no_todo() -> Self {
        Self {
            id: "no-todo".into(),
            description: "TODO marker added".into(),
            category: "style".into(),
            severity: Severity::Low,
            pattern: r"\b(TODO|FIXME|XXX)\b".into(),
            scope: default_scope(),
            exclude: vec!["**/*.md".into()],
            trivial: false,
            fix: None,
            tip: Some("Track the follow-up in an issue instead.".into()),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::no_console(),
            Self::no_magic_numbers(),
            Self::no_empty_catch(),
            Self::no_todo(),
        ]
    }
}
