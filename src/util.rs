pub mod diff;
pub mod similarity;

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, error, warn};

const GIT_EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// What the review compares against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// Every tracked file, diffed against the empty tree
    Root,
    /// Changes since a commit-ish (`HEAD`, `HEAD^`, a hash, `@{1.day.ago}`)
    Commit(String),
}

impl FromStr for Base {
    type Err = Infallible;

    /// `ROOT` selects all files; a leading `^` or `~` is relative to `HEAD`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "ROOT" => Self::Root,
            rel if rel.starts_with(['^', '~']) => Self::Commit(format!("HEAD{}", rel)),
            commit => Self::Commit(commit.to_string()),
        })
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("ROOT"),
            Self::Commit(commit) => f.write_str(commit),
        }
    }
}

impl Base {
    /// Resolve `--base`; empty means `HEAD` with a dirty worktree, otherwise `HEAD^`
    pub fn resolve(raw: &str) -> Result<Self> {
        if !raw.trim().is_empty() {
            let Ok(base) = raw.parse::<Self>();
            return Ok(base);
        }
        let dirty = !git(&["status", "--porcelain", "--untracked-files=no"])?
            .trim()
            .is_empty();
        let base = Self::Commit(if dirty { "HEAD" } else { "HEAD^" }.to_string());
        debug!("Auto-detected base {} (dirty worktree: {})", base, dirty);
        Ok(base)
    }

    fn commit(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Commit(commit) => Some(commit),
        }
    }

    /// Tree-ish handed to `git diff`
    fn tree_ish(&self) -> &str {
        self.commit().unwrap_or(GIT_EMPTY_TREE)
    }
}

fn git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub fn get_changed_files(base: &Base) -> Result<Vec<String>> {
    let stdout = match base {
        Base::Root => git(&["ls-files"])?,
        Base::Commit(commit) => git(&["diff", "--name-only", commit])?,
    };

    Ok(stdout
        .lines()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect())
}

/// Per-file unified diffs; files whose diff cannot be produced are skipped
pub fn get_diffs(base: &Base, files: &[String]) -> HashMap<String, String> {
    let mut diffs = HashMap::new();
    let diff_base = base.tree_ish();

    for file in files {
        match git(&["diff", diff_base, "--", file]) {
            Ok(diff) if !diff.is_empty() => {
                diffs.insert(file.clone(), diff);
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping diff for {}: {}", file, e),
        }
    }

    diffs
}

pub fn get_commit_messages(base: &Base) -> Result<String> {
    let Some(commit) = base.commit() else {
        return Ok(String::new());
    };

    let stdout = git(&["log", "--format=%s", &format!("{}..HEAD", commit)])?;
    Ok(stdout.trim().to_string())
}

/// Compile glob patterns from a config setting; invalid patterns are skipped with a warning
pub fn build_globset(patterns: &[String], setting: &str) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Invalid pattern '{}' in {}: {}", pattern, setting, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        error!("Failed to build globset for {}: {}", setting, e);
        GlobSet::empty()
    })
}
