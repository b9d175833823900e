//! channel-harvest main entry point
//!
//! This is the command-line interface for the channel-harvest index harvester.

use anyhow::{Context, Result};
use channel_harvest::config::{parse_config, validate, Config, HarvestMethod};
use channel_harvest::harvest::{build_http_client, plan_tasks, run_harvest, HarvestOptions};
use channel_harvest::plan::{Granularity, ResumePoint};
use channel_harvest::storage::{open_sink, RunStatus};
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// channel-harvest: an incremental channel-homepage harvester
///
/// channel-harvest queries historical web indexes for channel homepage
/// captures, reduces every capture to one canonical channel URL, and records
/// channels that are not yet in the database.
#[derive(Parser, Debug)]
#[command(name = "channel-harvest")]
#[command(version)]
#[command(about = "An incremental channel-homepage harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (all keys are optional)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Harvest method: cc-index or wayback
    #[arg(long)]
    method: Option<HarvestMethod>,

    /// Year whose snapshots are harvested (cc-index)
    #[arg(long)]
    year: Option<i32>,

    /// First day of the harvested span, YYYY-MM-DD (wayback)
    #[arg(long, value_name = "DATE")]
    start_date: Option<NaiveDate>,

    /// Last day of the harvested span, YYYY-MM-DD (wayback)
    #[arg(long, value_name = "DATE")]
    end_date: Option<NaiveDate>,

    /// Window size: whole, month, day, or days:N (wayback)
    #[arg(long)]
    granularity: Option<Granularity>,

    /// Entities per sink insert
    #[arg(long)]
    batch_size: Option<usize>,

    /// Rows per index page (wayback)
    #[arg(long)]
    page_size: Option<u32>,

    /// Maximum pages requested per task
    #[arg(long)]
    max_pages: Option<u32>,

    /// Path to the SQLite database
    #[arg(long, value_name = "FILE")]
    database: Option<String>,

    /// Local cache of the snapshot directory (cc-index)
    #[arg(long, value_name = "FILE")]
    collinfo_path: Option<String>,

    /// Skip failed windows instead of bisecting them
    #[arg(long)]
    no_split: bool,

    /// Continue the latest interrupted run after its last checkpoint
    #[arg(long, conflicts_with = "resume_window")]
    resume: bool,

    /// Start at the first task of this window (snapshot id or YYYY-MM-DD)
    #[arg(long, value_name = "WINDOW")]
    resume_window: Option<String>,

    /// Pattern within --resume-window to start at
    #[arg(long, value_name = "PATTERN", requires = "resume_window")]
    resume_pattern: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the planned tasks without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        let harvest = &mut config.harvest;
        if let Some(method) = self.method {
            harvest.method = method;
        }
        if let Some(year) = self.year {
            harvest.year = Some(year);
        }
        if let Some(start) = self.start_date {
            harvest.start_date = Some(start);
        }
        if let Some(end) = self.end_date {
            harvest.end_date = Some(end);
        }
        if let Some(granularity) = self.granularity {
            harvest.granularity = granularity;
        }
        if let Some(batch_size) = self.batch_size {
            harvest.batch_size = batch_size;
        }
        if let Some(page_size) = self.page_size {
            harvest.page_size = page_size;
        }
        if let Some(max_pages) = self.max_pages {
            harvest.max_pages = max_pages;
        }
        if self.no_split {
            harvest.split_on_failure = false;
        }
        if let Some(database) = &self.database {
            config.sink.database_path = database.clone();
        }
        if let Some(path) = &self.collinfo_path {
            config.index.collinfo_path = Some(path.clone());
        }
    }

    fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            resume_point: self.resume_window.as_ref().map(|window| ResumePoint {
                window: window.clone(),
                pattern: self.resume_pattern.clone(),
            }),
            resume_interrupted: self.resume,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_effective_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config).await
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(&config, &cli.harvest_options()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("channel_harvest=info,warn"),
            1 => EnvFilter::new("channel_harvest=debug,info"),
            2 => EnvFilter::new("channel_harvest=trace,debug"),
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

/// Reads the optional config file, applies overrides, and validates
fn load_effective_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => Config::default(),
    };

    cli.apply_overrides(&mut config);
    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates config and shows the planned tasks
async fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== channel-harvest Dry Run ===\n");

    println!("Harvest:");
    println!("  Method: {}", config.harvest.method);
    match config.harvest.method {
        HarvestMethod::CcIndex => {
            if let Some(year) = config.harvest.year {
                println!("  Year: {}", year);
            }
        }
        HarvestMethod::Wayback => {
            if let Some(range) = config.harvest.date_range_until_today() {
                println!("  Span: {}", range);
            }
            println!("  Granularity: {}", config.harvest.granularity);
            println!("  Split on failure: {}", config.harvest.split_on_failure);
        }
    }
    println!("  Batch size: {}", config.harvest.batch_size);
    println!("  Page size: {}", config.harvest.page_size);
    println!("  Max pages per task: {}", config.harvest.max_pages);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nSink:");
    println!("  Database: {}", config.sink.database_path);

    let http = build_http_client(&config.user_agent, config.index.request_timeout())?;
    let tasks = plan_tasks(config, &http).await.context("Planning failed")?;

    println!("\nPlanned Tasks ({}):", tasks.len());
    for task in &tasks {
        println!("  - {}", task);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    use channel_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.sink.database_path);

    let sink = open_sink(Path::new(&config.sink.database_path))
        .with_context(|| format!("Failed to open {}", config.sink.database_path))?;
    let stats = load_statistics(&sink)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, options: &HarvestOptions) -> Result<()> {
    use channel_harvest::output::print_harvest_summary;

    tracing::info!(
        "Starting {} harvest into {}",
        config.harvest.method,
        config.sink.database_path
    );

    let outcome = run_harvest(config, options).await.context("Harvest failed")?;
    print_harvest_summary(&outcome.summary);

    if outcome.status == RunStatus::Interrupted {
        println!("\nRun {} was interrupted; continue it with --resume", outcome.run_id);
    }
    Ok(())
}
