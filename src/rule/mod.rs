//! Immutable, compiled rule sets.
//!
//! A [`RuleSet`] is built once per analysis and passed by reference into the
//! rule agent and the auto-fix estimator. Adding a rule produces a new set.

pub mod body;

use body::{FixAction, RuleBody};
use crate::util::build_globset;
use globset::GlobSet;
use regex::Regex;
use tracing::{debug, warn};

/// A rule with its pattern and globs compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub body: RuleBody,
    pattern: Regex,
    scope: GlobSet,
    exclude: GlobSet,
}

impl CompiledRule {
    /// Compile a rule, returning `None` (with a warning) if its regex is invalid
    ///
    /// Invalid scope or exclude globs are skipped.
    pub fn compile(body: RuleBody) -> Option<Self> {
        let pattern = match Regex::new(&body.pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Invalid pattern in rule '{}': {}", body.id, e);
                return None;
            }
        };
        let scope = build_globset(&body.scope, &format!("rule '{}' scope", body.id));
        let exclude = build_globset(&body.exclude, &format!("rule '{}' exclude", body.id));
        Some(Self {
            body,
            pattern,
            scope,
            exclude,
        })
    }

    pub fn id(&self) -> &str {
        &self.body.id
    }

    pub fn applies_to(&self, file: &str) -> bool {
        self.scope.is_match(file) && !self.exclude.is_match(file)
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Rewrite a matching line with the rule's fix
    ///
    /// Returns `None` when the rule has no fix, the line does not match, or
    /// the rewrite would leave the line unchanged. An empty string is a deletion.
    pub fn propose_fix(&self, line: &str) -> Option<String> {
        if !self.matches(line) {
            return None;
        }
        let fixed = match self.body.fix.as_ref()? {
            FixAction::Delete => String::new(),
            FixAction::Replace(replacement) => self
                .pattern
                .replace_all(line, replacement.as_str())
                .into_owned(),
        };
        (fixed != line).then_some(fixed)
    }
}

/// An immutable collection of compiled rules, keyed by id
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new(bodies: impl IntoIterator<Item = RuleBody>) -> Self {
        bodies
            .into_iter()
            .fold(Self::default(), |set, body| set.with_rule(body))
    }

    /// The built-in rules (console statements, magic numbers, empty catch, TODO markers)
    pub fn builtin() -> Self {
        Self::new(RuleBody::builtin())
    }

    /// Return a new set with `body` added, replacing any rule with the same id
    ///
    /// A rule that fails to compile leaves the set unchanged.
    pub fn with_rule(self, body: RuleBody) -> Self {
        let Some(compiled) = CompiledRule::compile(body) else {
            return self;
        };
        let mut rules: Vec<CompiledRule> = self
            .rules
            .into_iter()
            .filter(|r| r.id() != compiled.id())
            .collect();
        debug!("Registered rule '{}'", compiled.id());
        rules.push(compiled);
        Self { rules }
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    /// Rules whose scope covers `file`
    pub fn for_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a CompiledRule> {
        self.rules.iter().filter(move |r| r.applies_to(file))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
