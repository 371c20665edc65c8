use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tally::cli::{Cli, Commands, InitArgs};
use tally::config::Config;
use tally::review::orchestrator;
use tally::types::{Finding, Verdict};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(Some(Verdict::RequestChanges)) => std::process::exit(EXIT_FAILURE),
        Ok(_) => {}
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<Option<Verdict>> {
    match &cli.command {
        Commands::Init(args) => init(args).map(|_| None),
        Commands::Review(args) => {
            let config = Config::load(&args.config, &args.config_overrides)?;
            orchestrator::orchestrate_and_run(args, &config).await
        }
        Commands::Fix(args) => {
            let config = Config::load(&args.config, &args.config_overrides)?;
            orchestrator::run_fix(args, &config).await.map(|_| None)
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(Vec<Finding>);
            let rendered =
                serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
            println!("{}", rendered);
            Ok(None)
        }
    }
}

fn init(args: &InitArgs) -> Result<()> {
    if Path::new(&args.config).exists() && !args.r#override {
        bail!(
            "{} already exists, pass --override to replace it",
            args.config
        );
    }
    let content = Config::default().to_toml()?;
    std::fs::write(&args.config, content)
        .with_context(|| format!("Failed to write {}", args.config))?;
    info!("Wrote default config to {}", args.config);
    Ok(())
}
