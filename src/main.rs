//! Campus-Harvest main entry point
//!
//! This is the command-line interface for the Campus-Harvest portal scraper.

use anyhow::{bail, Context};
use campus_harvest::config::{load_config_with_hash, Config};
use campus_harvest::extract::NavFilter;
use campus_harvest::harvest::open_orchestrator;
use campus_harvest::output::{aggregate_dataset, load_statistics, print_statistics};
use campus_harvest::storage::{open_storage, StateStore};
use campus_harvest::{DatasetKey, DatasetSelection, Orchestrator, RunOutcome};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Runs shown by `--stats`
const STATS_RUN_LIMIT: usize = 10;

/// Campus-Harvest: a resumable scraper for legacy student portals
///
/// Campus-Harvest logs into the portal, walks the selected datasets at a
/// polite pace and keeps its progress in SQLite so a run can be paused
/// (Ctrl-C) and resumed later.
#[derive(Parser, Debug)]
#[command(name = "campus-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable scraper for legacy student portals", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Datasets to scrape, comma separated (keys or aliases)
    #[arg(long, value_delimiter = ',', conflicts_with = "all")]
    datasets: Vec<String>,

    /// Scrape every dataset (default when neither --datasets nor [datasets] is given)
    #[arg(long)]
    all: bool,

    /// Resume a paused run
    #[arg(long, conflicts_with_all = ["datasets", "all", "hard_stop", "stats", "show", "dry_run", "clear_logs", "clear_all"])]
    resume: bool,

    /// Terminate a paused run; its checkpoints are discarded
    #[arg(long, conflicts_with_all = ["datasets", "all", "stats", "show", "dry_run", "clear_logs", "clear_all"])]
    hard_stop: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["show", "dry_run", "clear_logs", "clear_all"])]
    stats: bool,

    /// Print one dataset as JSON and exit
    #[arg(long, value_name = "DATASET", conflicts_with_all = ["dry_run", "clear_logs", "clear_all"])]
    show: Option<String>,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["clear_logs", "clear_all"])]
    dry_run: bool,

    /// Clear the stored log entries
    #[arg(long, conflicts_with = "clear_all")]
    clear_logs: bool,

    /// Clear the stored log entries and the request archive
    #[arg(long)]
    clear_all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        let selection = selection_from(&cli, &config)?;
        handle_dry_run(&config, &selection);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(name) = &cli.show {
        handle_show(&config, name)?;
    } else if cli.clear_logs || cli.clear_all {
        let mut orchestrator = open_orchestrator(config, &config_hash)?;
        orchestrator.clear_logs(cli.clear_all);
        orchestrator.shutdown();
        println!("Logs cleared");
    } else if cli.hard_stop {
        let mut orchestrator = open_orchestrator(config, &config_hash)?;
        let ack = orchestrator.hard_stop();
        orchestrator.shutdown();
        ack.context("Only a paused run can be hard-stopped")?;
        println!("Run terminated; checkpoints discarded");
    } else {
        let selection = if cli.resume {
            DatasetSelection::default()
        } else {
            selection_from(&cli, &config)?
        };
        handle_run(open_orchestrator(config, &config_hash)?, &selection, cli.resume).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("campus_harvest=info,warn"),
            1 => EnvFilter::new("campus_harvest=debug,info"),
            2 => EnvFilter::new("campus_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Picks the datasets of a run: `--all`, then `--datasets`, then the
/// config's `[datasets]` table, then everything
fn selection_from(cli: &Cli, config: &Config) -> anyhow::Result<DatasetSelection> {
    let selection = if cli.all {
        DatasetSelection::all()
    } else if !cli.datasets.is_empty() {
        DatasetSelection::from_names(&cli.datasets)?
    } else if !config.datasets.is_empty() {
        DatasetSelection::from_flags(&config.datasets)?
    } else {
        DatasetSelection::all()
    };
    if selection.is_empty() {
        bail!("No datasets selected");
    }
    Ok(selection)
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, selection: &DatasetSelection) {
    println!("=== Campus-Harvest Dry Run ===\n");

    println!("Portal:");
    println!("  Base URL: {}", config.portal.base_url);
    println!("  Login page: {}", config.portal.login_page);
    println!("  Login form: {}", config.portal.login_submit);

    println!("\nClient:");
    println!("  Timeout: {}ms", config.client.timeout_ms);
    println!(
        "  Slow response: >{}ms x{} -> cooldown {}-{}ms",
        config.client.slow_response_ms,
        config.client.slow_streak,
        config.client.cooldown_min_ms,
        config.client.cooldown_max_ms
    );

    println!("\nPacing:");
    println!(
        "  Between sub-items: {}-{}ms",
        config.pacing.item_delay_min_ms, config.pacing.item_delay_max_ms
    );
    println!("  After pages: {}ms", config.pacing.page_delay_ms);
    println!(
        "  Login retries: {} (backoff from {}ms)",
        config.pacing.login_retries, config.pacing.login_backoff_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nDatasets ({}):", selection.len());
    for key in selection.ordered() {
        println!("  - {} ({}) -> {}", key, key.label(), key.path(&config.portal));
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} steps (login + datasets)", selection.len() + 1);
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&store, STATS_RUN_LIMIT)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --show mode: prints one dataset's aggregated view
///
/// Reads the store directly so a run in another process is left alone.
fn handle_show(config: &Config, name: &str) -> anyhow::Result<()> {
    let Some(key) = DatasetKey::parse(name) else {
        bail!("Unknown dataset: {}", name);
    };
    let store = open_storage(Path::new(&config.storage.database_path))?;
    let state = store.load_state()?.unwrap_or_default();
    let filter = NavFilter::from_config(&config.extraction)?;

    match aggregate_dataset(&state, key, &filter) {
        Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
        None => println!("{} has not been scraped yet", key.label()),
    }
    Ok(())
}

/// Handles the main scrape operation (start or resume)
async fn handle_run(
    mut orchestrator: Orchestrator,
    selection: &DatasetSelection,
    resume: bool,
) -> anyhow::Result<()> {
    // Ctrl-C pauses at the next poll point instead of killing the run
    let control = orchestrator.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; pausing after the current request");
            control.request_pause();
        }
    });

    let result = if resume {
        tracing::info!("Resuming paused run");
        orchestrator.resume().await
    } else {
        tracing::info!("Starting run over {} dataset(s)", selection.len());
        orchestrator.start(selection).await
    };

    let state = orchestrator.state();
    orchestrator.shutdown();

    match result {
        Ok(RunOutcome::Completed) => {
            println!(
                "✓ Run completed: {} dataset(s), {} error(s)",
                state.page_order.len(),
                state.errors.len()
            );
        }
        Ok(RunOutcome::Paused) => {
            println!(
                "Run paused at dataset {}/{}; continue with --resume",
                state.current_dataset_index + 1,
                state.page_order.len()
            );
        }
        Ok(RunOutcome::Terminated) => println!("Run terminated"),
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}
