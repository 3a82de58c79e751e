use anyhow::Result;
use clap::{Parser, Subcommand};
use pricewatch::harness::{HarnessOptions, run_harness};
use pricewatch::pipeline::{
    PrepareOptions, RunOptions, match_batch, normalize_batch, run_batch, validate_config,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pricewatch",
    about = "Normalize retail listings, match them across sites and track price changes"
)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "data/fragments")]
    fragments_dir: PathBuf,

    #[arg(long, default_value = "data/state/snapshot.json")]
    snapshot: PathBuf,

    #[arg(long, default_value = "data/out")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run {
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    Normalize {
        #[arg(long)]
        site: Option<String>,
    },
    Match {
        #[arg(long)]
        site: Option<String>,
    },
    Validate,
    Harness,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { site, dry_run } => {
            let run = run_batch(&RunOptions {
                config_path: cli.config,
                fragments_dir: cli.fragments_dir,
                snapshot_path: cli.snapshot,
                out_dir: cli.out_dir,
                site,
                dry_run,
            })?;

            let summary = &run.outcome.summary;
            info!(
                fragments = run.report.fragments_loaded,
                products = run.report.products,
                matched_groups = run.report.matched_groups,
                price_up = summary.price_up,
                price_down = summary.price_down,
                no_change = summary.no_change,
                newly_found = summary.newly_found,
                not_found = summary.not_found,
                availability_changed = summary.availability_changed,
                data_quality_issue = summary.data_quality_issue,
                unknown_availability = summary.unknown_availability,
                absent_price = summary.absent_price,
                "batch summary"
            );
        }
        Commands::Normalize { site } => {
            let products = normalize_batch(&PrepareOptions {
                config_path: cli.config,
                fragments_dir: cli.fragments_dir,
                site,
            })?;
            println!("{}", serde_json::to_string_pretty(&products)?);
        }
        Commands::Match { site } => {
            let (_, groups) = match_batch(&PrepareOptions {
                config_path: cli.config,
                fragments_dir: cli.fragments_dir,
                site,
            })?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        Commands::Validate => {
            let config = cli
                .config
                .ok_or_else(|| anyhow::anyhow!("--config is required for validate"))?;
            for line in validate_config(&config)? {
                println!("{line}");
            }
        }
        Commands::Harness => {
            let report = run_harness(&HarnessOptions {
                config_path: cli.config,
                fragments_dir: cli.fragments_dir,
            })?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
