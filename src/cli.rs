use crate::review::render::Host;
use crate::types::RiskLevel;
use clap::{Parser, Subcommand};

// Display order for agent option (placed at top of help text)
const AGENT_DISPLAY_ORDER: usize = 0;
// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(name = "tally", version, about = "Aggregate, deduplicate and score multi-agent code reviews", long_about = None)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: TALLY_LOG=] [default: info]
    #[arg(
        long,
        env = "TALLY_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default tally.toml config file
    Init(InitArgs),
    /// Aggregate agent outputs and the rule scan into one scored review
    Review(ReviewArgs),
    /// Propose auto-fixes for rule findings in the diff
    Fix(FixArgs),
    /// Print the JSON schema of the finding format agents may emit
    Schema,
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "tally.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Arguments for the review command
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Base commit to compare against.
    /// Examples: HEAD^ or ^, HEAD~1 or ~1, commit hash, @{1.day.ago}.
    /// HEAD for uncommitted changes, ROOT for all files
    /// [default: HEAD if uncommitted changes exist, otherwise ^]
    #[arg(
        long,
        default_value = "",
        hide_default_value = true,
        verbatim_doc_comment
    )]
    pub base: String,

    /// Path to config file (initialize with `tally init`)
    #[arg(long, default_value = "tally.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. verdict.approve_threshold=90)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,

    /// Raw agent output file as NAME[:ROLE]=PATH (repeatable).
    /// ROLE is one of security, quality, performance, testing, style, summary, other;
    /// when omitted it is inferred from NAME
    #[arg(long = "agent", display_order = AGENT_DISPLAY_ORDER, verbatim_doc_comment)]
    pub agents: Vec<String>,

    /// Risk level of the change set (low, medium, high) [default: assessed from the diff]
    #[arg(long)]
    pub risk: Option<RiskLevel>,

    /// Code host whose review event vocabulary is reported (github, gitlab)
    #[arg(long, default_value = "github")]
    pub host: Host,

    /// Minimum confidence for reported auto-fixes [default: autofix.min_confidence]
    #[arg(long)]
    pub fix_threshold: Option<u8>,

    /// Dry run: only show agents and changed files without reviewing
    #[arg(long)]
    pub dry_run: bool,

    /// Output file path (.md or .json)
    #[arg(long)]
    pub output: Option<String>,
}

/// Arguments for the fix command
#[derive(Parser, Debug)]
pub struct FixArgs {
    /// Base commit to compare against (same forms as `review --base`)
    #[arg(long, default_value = "", hide_default_value = true)]
    pub base: String,

    /// Path to config file
    #[arg(long, default_value = "tally.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. autofix.min_confidence=90)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,

    /// Minimum confidence for a fix to be reported or applied [default: autofix.min_confidence]
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Rewrite the working tree files with the fixes
    #[arg(long)]
    pub apply: bool,

    /// Output file path (.md or .json)
    #[arg(long)]
    pub output: Option<String>,
}
