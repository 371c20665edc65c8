use super::autofix::{self, FixProposal};
use super::render::{self, Report};
use super::rules_agent::RuleAgent;
use super::worker::{self, OutputFileAgent, ReviewAgent, ReviewContext, WorkerResult};
use super::{aggregate, risk};
use crate::cli::{FixArgs, ReviewArgs};
use crate::config::{AutofixConfig, Config};
use crate::rule::RuleSet;
use crate::types::{FixSuggestion, Verdict};
use crate::util;
use anyhow::{Context, Result, bail};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Orchestrate one review
///
/// - Resolves the base commit and collects changed files, diffs and commit messages
/// - Builds the agents: one per `--agent` output file plus the rule agent
/// - Runs them concurrently (with optional concurrency limit)
/// - Aggregates, assesses risk, estimates auto-fixes and writes the report
///
/// Returns `None` for a dry run, otherwise the verdict.
pub async fn orchestrate_and_run(args: &ReviewArgs, config: &Config) -> Result<Option<Verdict>> {
    let ctx = collect_context(&args.base)?;

    let rules = build_rule_set(config);
    let mut agents: Vec<Box<dyn ReviewAgent>> = Vec::new();
    for spec in &args.agents {
        agents.push(Box::new(OutputFileAgent::from_spec(spec)?));
    }
    if config.review.rules_agent {
        agents.push(Box::new(RuleAgent::new(rules.clone())));
    }
    info!("Registered {} agent(s)", agents.len());

    if args.dry_run {
        info!("Dry run - {} agents would review {} files:", agents.len(), ctx.changed_files.len());
        for agent in &agents {
            info!("  Agent '{}' as {}", agent.name(), agent.role());
        }
        for file in &ctx.changed_files {
            info!("  File: {}", file);
        }
        for commit in ctx.commit_messages.lines() {
            info!("  Commit: {}", commit);
        }
        return Ok(None);
    }

    let results = run_agents(&agents, &ctx, config).await;
    let failed = results.iter().filter(|r| r.set.failed).count();
    if failed > 0 {
        warn!("{} agent(s) failed and count as passing", failed);
    }

    let (sets, proposals): (Vec<_>, Vec<_>) = results.into_iter().map(|r| (r.set, r.fixes)).unzip();
    let proposals: Vec<FixProposal> = proposals.into_iter().flatten().collect();

    let risk = match args.risk {
        Some(risk) => {
            debug!("Risk overridden to {}", risk);
            risk
        }
        None => risk::assess_risk(&ctx.changed_files, &ctx.diffs, &config.risk),
    };
    let review = aggregate(&sets, risk, config);

    let autofix_config = with_threshold(&config.autofix, args.fix_threshold);
    let fixes = autofix::collect_fixes(&proposals, &rules, &autofix_config);

    let inline = render::inline_comments(&review, config.review.max_inline_comments);
    debug!("{} inline comment(s) within budget", inline.len());

    let report = Report {
        review: &review,
        agents: &sets,
        fixes: &fixes,
        risk,
        host: args.host,
        max_findings: config.review.max_inline_comments,
    };
    match &args.output {
        Some(path) => write_output(path, &report)?,
        None => print_report(&report),
    }

    info!(
        "Verdict: {} (score {}, {} event '{}')",
        review.verdict,
        review.overall_score,
        args.host,
        render::host_event(review.verdict, args.host)
    );
    if review.verdict == Verdict::RequestChanges {
        for reason in super::verdict::block_reasons(&review.findings, risk, &config.verdict) {
            error!("Blocking: {}", reason);
        }
        info!("If findings are misreported, refine policy in {}", args.config);
    }
    Ok(Some(review.verdict))
}

/// Propose auto-fixes for rule findings and optionally apply them
pub async fn run_fix(args: &FixArgs, config: &Config) -> Result<()> {
    let ctx = collect_context(&args.base)?;
    let rules = build_rule_set(config);
    let agent = RuleAgent::new(rules.clone());

    // The fix command reads the local diff only, so run the rule agent through the worker directly
    let exclude = util::build_globset(&config.review.exclude, "review.exclude");
    let result = worker::worker(
        &agent,
        &ctx,
        Duration::from_secs(config.review.agent_timeout_secs),
        &exclude,
        &config.scoring,
    )
    .await;

    let autofix_config = with_threshold(&config.autofix, args.threshold);
    let fixes = autofix::collect_fixes(&result.fixes, &rules, &autofix_config);
    info!(
        "{} fix(es) at confidence >= {}",
        fixes.len(),
        autofix_config.min_confidence
    );

    match &args.output {
        Some(path) if path.ends_with(".json") => {
            let content =
                serde_json::to_string_pretty(&fixes).context("Failed to serialize fixes")?;
            write_file(path, &content)?;
        }
        Some(path) if path.ends_with(".md") => write_file(path, &render::format_fixes(&fixes))?,
        Some(_) => bail!("Output file must end with .md or .json"),
        None => {
            for line in render::format_fixes(&fixes).lines() {
                info!("{}", line);
            }
        }
    }

    if args.apply {
        let applied = apply_fixes(&fixes)?;
        info!("Applied {} of {} fix(es)", applied, fixes.len());
    }
    Ok(())
}

fn collect_context(diff_base: &str) -> Result<ReviewContext> {
    let base = util::Base::resolve(diff_base)?;
    debug!("Resolved base: {}", base);

    debug!("Getting changed files for base");
    let changed_files = util::get_changed_files(&base)?;
    info!("Found {} changed files", changed_files.len());
    trace!("Changed files: {:?}", changed_files);

    debug!("Generating diffs for {} files", changed_files.len());
    let diffs = util::get_diffs(&base, &changed_files);

    debug!("Getting commit messages for base");
    let commit_messages = util::get_commit_messages(&base)?;

    Ok(ReviewContext {
        changed_files,
        diffs,
        commit_messages,
    })
}

fn build_rule_set(config: &Config) -> RuleSet {
    let rules = config
        .rules
        .iter()
        .cloned()
        .fold(RuleSet::builtin(), RuleSet::with_rule);
    debug!("Rule set has {} rule(s)", rules.len());
    rules
}

fn with_threshold(config: &AutofixConfig, threshold: Option<u8>) -> AutofixConfig {
    AutofixConfig {
        min_confidence: threshold.map_or(config.min_confidence, |t| t.min(100)),
        ..config.clone()
    }
}

/// Run every agent, returning results in registration order
pub async fn run_agents(
    agents: &[Box<dyn ReviewAgent>],
    ctx: &ReviewContext,
    config: &Config,
) -> Vec<WorkerResult> {
    let timeout = Duration::from_secs(config.review.agent_timeout_secs);
    let exclude = util::build_globset(&config.review.exclude, "review.exclude");

    debug!("Creating worker futures for {} agents", agents.len());
    let futures: Vec<_> = agents
        .iter()
        .enumerate()
        .map(|(i, agent)| {
            let exclude = &exclude;
            async move {
                let result =
                    worker::worker(agent.as_ref(), ctx, timeout, exclude, &config.scoring).await;
                (i, result)
            }
        })
        .collect();

    let max_parallel_agents = config.review.max_parallel_agents.filter(|max| *max > 0);
    if let Some(max) = max_parallel_agents {
        info!("Running agents with max parallelism: {}", max);
    } else {
        info!("Running agents with unlimited parallelism");
    }

    // Execute workers with optional concurrency limit
    let mut results = if let Some(max_workers) = max_parallel_agents {
        // Limit parallel execution using a worker pool
        use futures::stream::{FuturesUnordered, StreamExt};
        let mut stream = FuturesUnordered::new();
        let mut results = Vec::with_capacity(futures.len());
        let mut futures_iter = futures.into_iter();

        // Fill initial pool up to max_workers
        for _ in 0..max_workers.min(futures_iter.len()) {
            if let Some(fut) = futures_iter.next() {
                stream.push(fut);
            }
        }

        // As workers complete, spawn new ones to maintain pool size
        while let Some(result) = stream.next().await {
            results.push(result);
            if let Some(fut) = futures_iter.next() {
                stream.push(fut);
            }
        }

        results
    } else {
        // No limit - run all workers in parallel
        join_all(futures).await
    };

    // Completion order is arbitrary under the pool; restore registration order
    results.sort_by_key(|(i, _)| *i);
    let results: Vec<WorkerResult> = results.into_iter().map(|(_, r)| r).collect();

    let failed = results.iter().filter(|r| r.set.failed).count();
    info!(
        "Agents complete: {} succeeded, {} failed",
        results.len() - failed,
        failed
    );
    results
}

fn print_report(report: &Report) {
    for line in render::format_markdown(report).lines() {
        info!("{}", line);
    }
}

fn write_output(path: &str, report: &Report) -> Result<()> {
    let content = if path.ends_with(".json") {
        render::format_json(report, chrono::Utc::now())?
    } else if path.ends_with(".md") {
        render::format_markdown(report)
    } else {
        bail!("Output file must end with .md or .json");
    };
    write_file(path, &content)
}

fn write_file(path: &str, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write output file {}", path))?;
    info!("Results written to {}", path);
    Ok(())
}

/// Rewrite files in place; a fix is skipped when its line no longer holds the original code
///
/// Returns the number of fixes applied.
pub fn apply_fixes(fixes: &[FixSuggestion]) -> Result<usize> {
    let mut by_file: BTreeMap<&str, Vec<&FixSuggestion>> = BTreeMap::new();
    for fix in fixes {
        by_file.entry(fix.file.as_str()).or_default().push(fix);
    }

    let mut applied = 0;
    for (file, mut file_fixes) in by_file {
        let content =
            std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
        // Each line keeps its own terminator so untouched lines are written back as read
        let mut lines: Vec<(&str, &str)> =
            content.split_inclusive('\n').map(split_eol).collect();

        // Bottom-up so deletions do not shift the lines still to patch
        file_fixes.sort_by(|a, b| b.line.cmp(&a.line));
        let mut seen: HashSet<u32> = HashSet::new();
        for fix in file_fixes {
            if !seen.insert(fix.line) {
                debug!("{}:{} already patched, skipping", file, fix.line);
                continue;
            }
            let Some(index) = (fix.line as usize).checked_sub(1) else {
                continue;
            };
            if lines.get(index).map(|(body, _)| *body) != Some(fix.original_code.as_str()) {
                warn!("{}:{} changed since review, skipping fix", file, fix.line);
                continue;
            }
            if fix.is_deletion() {
                lines.remove(index);
            } else {
                lines[index].0 = fix.fixed_code.as_str();
            }
            applied += 1;
        }

        let patched: String = lines
            .iter()
            .flat_map(|(body, eol)| [*body, *eol])
            .collect();
        std::fs::write(file, patched).with_context(|| format!("Failed to write {}", file))?;
        debug!("Patched {}", file);
    }
    Ok(applied)
}

/// Split a line from `split_inclusive('\n')` into its body and terminator
fn split_eol(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
