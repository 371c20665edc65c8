use super::autofix::FixProposal;
use super::{parser, score};
use crate::config::ScoringConfig;
use crate::types::{AgentRole, Finding, FindingSet};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use globset::GlobSet;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Change set shared by every agent in one analysis
#[derive(Debug, Clone, Default)]
pub struct ReviewContext {
    pub changed_files: Vec<String>,
    /// Unified diff per changed file
    pub diffs: HashMap<String, String>,
    pub commit_messages: String,
}

/// What an agent hands back before the worker turns it into a [`FindingSet`]
#[derive(Debug, Clone, Default)]
pub struct AgentReport {
    pub findings: Vec<Finding>,
    /// Self-score; the deduction score is computed when absent
    pub score: Option<u8>,
    /// Line rewrites for the auto-fix estimator
    pub fixes: Vec<FixProposal>,
}

/// A reviewer that inspects the change set and reports findings
#[async_trait]
pub trait ReviewAgent: Send + Sync {
    /// Display name, stamped as `source` on every finding
    fn name(&self) -> &str;

    fn role(&self) -> AgentRole;

    async fn review(&self, ctx: &ReviewContext) -> Result<AgentReport>;
}

/// Worker result: the immutable finding set plus any fix proposals
#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub set: FindingSet,
    pub fixes: Vec<FixProposal>,
}

/// Run one agent under a timeout
///
/// Errors and timeouts are logged and produce a failed set (score 100, no
/// findings) so aggregation never waits on a broken agent. Findings on files
/// matching `exclude` are dropped before scoring.
pub async fn worker(
    agent: &dyn ReviewAgent,
    ctx: &ReviewContext,
    timeout: Duration,
    exclude: &GlobSet,
    scoring: &ScoringConfig,
) -> WorkerResult {
    let start = Instant::now();
    let name = agent.name();
    let role = agent.role();
    info!("[Agent {}] Reviewing {} files as {}", name, ctx.changed_files.len(), role);

    let outcome = tokio::time::timeout(timeout, agent.review(ctx)).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let report = match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            warn!("[Agent {}] Failed after {}ms: {:#}", name, elapsed_ms, e);
            return WorkerResult {
                set: FindingSet::failed(name, role, elapsed_ms),
                fixes: Vec::new(),
            };
        }
        Err(_) => {
            warn!("[Agent {}] Timed out after {}s", name, timeout.as_secs_f64());
            return WorkerResult {
                set: FindingSet::failed(name, role, elapsed_ms),
                fixes: Vec::new(),
            };
        }
    };

    let reported = report.findings.len();
    let findings: Vec<Finding> = report
        .findings
        .into_iter()
        .filter(|f| !exclude.is_match(&f.file))
        .map(|f| Finding {
            source: name.to_string(),
            ..f
        })
        .collect();
    if findings.len() < reported {
        debug!(
            "[Agent {}] Dropped {} finding(s) on excluded files",
            name,
            reported - findings.len()
        );
    }
    let fixes: Vec<FixProposal> = report
        .fixes
        .into_iter()
        .filter(|p| !exclude.is_match(&p.finding.file))
        .map(|p| FixProposal {
            finding: Finding {
                source: name.to_string(),
                ..p.finding
            },
            ..p
        })
        .collect();

    let score = match report.score {
        Some(score) => score,
        None => score::agent_score(&findings, role, scoring),
    };
    trace!("[Agent {}] Findings: {:?}", name, findings);
    info!(
        "[Agent {}] Done: {} findings, score {} ({}ms)",
        name,
        findings.len(),
        score,
        elapsed_ms
    );

    WorkerResult {
        set: FindingSet::new(name, role, score, findings, elapsed_ms),
        fixes,
    }
}

/// Agent backed by a raw output file written by an external reviewer
#[derive(Debug, Clone)]
pub struct OutputFileAgent {
    name: String,
    role: AgentRole,
    path: String,
}

impl OutputFileAgent {
    pub fn new(name: impl Into<String>, role: AgentRole, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            path: path.into(),
        }
    }

    /// Parse `NAME[:ROLE]=PATH`; without a role it is inferred from the name
    pub fn from_spec(spec: &str) -> Result<Self> {
        let Some((head, path)) = spec.split_once('=') else {
            bail!("Invalid agent '{}', expected NAME[:ROLE]=PATH", spec);
        };
        let (name, role) = match head.rsplit_once(':') {
            Some((name, role)) => {
                let role = role
                    .parse::<AgentRole>()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid agent '{}'", spec))?;
                (name.trim(), role)
            }
            None => (head.trim(), AgentRole::infer(head)),
        };
        if name.is_empty() || path.trim().is_empty() {
            bail!("Invalid agent '{}', name and path must not be empty", spec);
        }
        Ok(Self::new(name, role, path.trim()))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl ReviewAgent for OutputFileAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    async fn review(&self, _ctx: &ReviewContext) -> Result<AgentReport> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read output of agent '{}' from {}", self.name, self.path))?;
        let parsed = parser::parse_output(&raw, &self.name);
        debug!(
            "[Agent {}] Parsed {:?} output: {} findings, {} dropped",
            self.name,
            parsed.format,
            parsed.findings.len(),
            parsed.dropped
        );
        Ok(AgentReport {
            findings: parsed.findings,
            score: parsed.score,
            fixes: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    struct StaticAgent {
        name: &'static str,
        role: AgentRole,
        report: AgentReport,
    }

    #[async_trait]
    impl ReviewAgent for StaticAgent {
        fn name(&self) -> &str {
            self.name
        }

        fn role(&self) -> AgentRole {
            self.role
        }

        async fn review(&self, _ctx: &ReviewContext) -> Result<AgentReport> {
            Ok(self.report.clone())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl ReviewAgent for FailingAgent {
        fn name(&self) -> &str {
            "broken"
        }

        fn role(&self) -> AgentRole {
            AgentRole::Security
        }

        async fn review(&self, _ctx: &ReviewContext) -> Result<AgentReport> {
            bail!("model returned HTTP 500")
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl ReviewAgent for SlowAgent {
        fn name(&self) -> &str {
            "slow"
        }

        fn role(&self) -> AgentRole {
            AgentRole::Performance
        }

        async fn review(&self, _ctx: &ReviewContext) -> Result<AgentReport> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(AgentReport::default())
        }
    }

    fn exclude(patterns: &[&str]) -> GlobSet {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        crate::util::build_globset(&patterns, "review.exclude")
    }

    #[tokio::test]
    async fn test_worker_stamps_source_and_scores() {
        let agent = StaticAgent {
            name: "Security Agent",
            role: AgentRole::Security,
            report: AgentReport {
                findings: vec![
                    Finding::new("a.ts", "Hardcoded key")
                        .with_severity(Severity::High)
                        .with_source("gpt"),
                ],
                score: None,
                fixes: vec![],
            },
        };
        let result = worker(
            &agent,
            &ReviewContext::default(),
            Duration::from_secs(5),
            &GlobSet::empty(),
            &ScoringConfig::default(),
        )
        .await;
        assert!(!result.set.failed);
        assert_eq!(result.set.findings[0].source, "Security Agent");
        // Security profile deducts 30 for a high finding
        assert_eq!(result.set.score, 70);
    }

    #[tokio::test]
    async fn test_worker_keeps_self_score() {
        let agent = StaticAgent {
            name: "quality",
            role: AgentRole::Quality,
            report: AgentReport {
                findings: vec![],
                score: Some(42),
                fixes: vec![],
            },
        };
        let result = worker(
            &agent,
            &ReviewContext::default(),
            Duration::from_secs(5),
            &GlobSet::empty(),
            &ScoringConfig::default(),
        )
        .await;
        assert_eq!(result.set.score, 42);
    }

    #[tokio::test]
    async fn test_worker_drops_excluded_files() {
        let agent = StaticAgent {
            name: "quality",
            role: AgentRole::Quality,
            report: AgentReport {
                findings: vec![
                    Finding::new("package-lock.json", "huge diff"),
                    Finding::new("src/a.ts", "real issue"),
                ],
                score: None,
                fixes: vec![],
            },
        };
        let result = worker(
            &agent,
            &ReviewContext::default(),
            Duration::from_secs(5),
            &exclude(&["**/*-lock.json"]),
            &ScoringConfig::default(),
        )
        .await;
        assert_eq!(result.set.findings.len(), 1);
        assert_eq!(result.set.findings[0].file, "src/a.ts");
    }

    #[tokio::test]
    async fn test_failed_agent_contributes_passing_empty_set() {
        let result = worker(
            &FailingAgent,
            &ReviewContext::default(),
            Duration::from_secs(5),
            &GlobSet::empty(),
            &ScoringConfig::default(),
        )
        .await;
        assert!(result.set.failed);
        assert_eq!(result.set.score, 100);
        assert!(result.set.findings.is_empty());
        assert_eq!(result.set.role, AgentRole::Security);
    }

    #[tokio::test]
    async fn test_timed_out_agent_is_failed() {
        let result = worker(
            &SlowAgent,
            &ReviewContext::default(),
            Duration::from_millis(20),
            &GlobSet::empty(),
            &ScoringConfig::default(),
        )
        .await;
        assert!(result.set.failed);
        assert_eq!(result.set.score, 100);
    }

    #[test]
    fn test_agent_spec_parsing() {
        let agent = OutputFileAgent::from_spec("Security Agent=out/security.json").unwrap();
        assert_eq!(agent.name(), "Security Agent");
        assert_eq!(agent.role(), AgentRole::Security);
        assert_eq!(agent.path(), "out/security.json");

        let agent = OutputFileAgent::from_spec("linus:quality=out/linus.md").unwrap();
        assert_eq!(agent.name(), "linus");
        assert_eq!(agent.role(), AgentRole::Quality);

        let agent = OutputFileAgent::from_spec("bob=b.txt").unwrap();
        assert_eq!(agent.role(), AgentRole::Other);

        assert!(OutputFileAgent::from_spec("no-path").is_err());
        assert!(OutputFileAgent::from_spec("x:wizard=a.json").is_err());
        assert!(OutputFileAgent::from_spec("=a.json").is_err());
    }

    #[tokio::test]
    async fn test_output_file_agent_missing_file_fails_worker() {
        let agent = OutputFileAgent::new("ghost", AgentRole::Other, "does/not/exist.json");
        let result = worker(
            &agent,
            &ReviewContext::default(),
            Duration::from_secs(5),
            &GlobSet::empty(),
            &ScoringConfig::default(),
        )
        .await;
        assert!(result.set.failed);
    }

    #[tokio::test]
    async fn test_output_file_agent_reads_and_parses() {
        let path = std::env::temp_dir().join(format!("tally-agent-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"score": 88, "findings": [{"file": "a.rs", "line": 2, "message": "Unchecked unwrap", "severity": "high", "category": "quality"}]}"#,
        )
        .unwrap();
        let agent = OutputFileAgent::new("quality", AgentRole::Quality, path.to_string_lossy());
        let report = agent.review(&ReviewContext::default()).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.score, Some(88));
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].source, "quality");
    }
}
