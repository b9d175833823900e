//! Harvest module for querying indexes and recording channels
//!
//! This module contains the core harvesting logic, including:
//! - Index requests with retry, backoff and paging
//! - Adaptive bisection of failing date windows
//! - Deduplicated, batched writes to the sink
//! - Overall run coordination, checkpoints and resumption

mod batcher;
mod coordinator;
mod fetcher;
mod retry;
mod splitter;

pub use batcher::{DedupBatcher, FlushReport, Offer, SeenSet};
pub use coordinator::{HarvestSummary, Harvester};
pub use fetcher::{build_http_client, IndexClient, PageFetch, TaskExecutor, TaskOutcome};
pub use retry::{retry_after, RetryPolicy};
pub use splitter::{AdaptiveSplitter, SkippedTask, SplitReport};

use crate::config::{compute_config_hash, Config, HarvestMethod};
use crate::index::{CommonCrawlApi, IndexApi, WaybackCdxApi};
use crate::plan::{
    discover_snapshots, plan_range, plan_snapshots, resume_after, resume_at, QueryTask, ResumePoint,
};
use crate::storage::{open_sink, RunStatus, Sink, SqliteSink};
use crate::{ConfigError, HarvestError};
use reqwest::Client;
use std::path::Path;

/// Where in the planned sequence a run starts
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Start at this task (inclusive); unknown points are fatal
    pub resume_point: Option<ResumePoint>,

    /// Continue the latest interrupted run after its last checkpoint
    pub resume_interrupted: bool,
}

/// Result of a finished (or interrupted) run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub summary: HarvestSummary,
}

/// Plans the full task list for the configured method
///
/// For the snapshot method this resolves the year through the snapshot
/// directory; for the range method it cuts the date span into windows.
pub async fn plan_tasks(config: &Config, http: &Client) -> Result<Vec<QueryTask>, HarvestError> {
    let patterns = config.harvest.effective_patterns();

    match config.harvest.method {
        HarvestMethod::CcIndex => {
            let year = config.harvest.year.ok_or_else(|| {
                ConfigError::Validation("year is required for the cc-index method".to_string())
            })?;
            let cache = config.index.collinfo_path.as_deref().map(Path::new);
            let snapshots = discover_snapshots(http, &config.index.collinfo_url, cache, year).await?;
            tracing::info!("Year {} resolved to {} snapshots", year, snapshots.len());
            Ok(plan_snapshots(&snapshots, &patterns)?)
        }
        HarvestMethod::Wayback => {
            let range = config.harvest.date_range_until_today().ok_or_else(|| {
                ConfigError::Validation("start date is after end date".to_string())
            })?;
            tracing::info!("Harvesting {} at {} granularity", range, config.harvest.granularity);
            Ok(plan_range(range, config.harvest.granularity, &patterns)?)
        }
    }
}

/// Runs a complete harvest operation
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the HTTP client and plan the task list
/// 2. Apply the requested resume position
/// 3. Open the sink and preload the seen set
/// 4. Run every task, checkpointing after each
/// 5. Record the run's final status and new-entity count
///
/// Ctrl+C stops the run between pages; pending entities are flushed and the
/// run is marked interrupted so `--resume` can pick it up.
///
/// # Arguments
///
/// * `config` - The validated harvest configuration
/// * `options` - Resume behavior
///
/// # Returns
///
/// * `Ok(RunOutcome)` - The run finished or was interrupted
/// * `Err(HarvestError)` - Configuration, planning or sink setup failed
pub async fn run_harvest(config: &Config, options: &HarvestOptions) -> Result<RunOutcome, HarvestError> {
    let config_hash = compute_config_hash(config)?;
    let http = build_http_client(&config.user_agent, config.index.request_timeout())?;

    let mut tasks = plan_tasks(config, &http).await?;
    tracing::info!("Planned {} tasks", tasks.len());

    let mut sink = open_sink(Path::new(&config.sink.database_path))?;

    let mut resumed_run = None;
    if let Some(point) = &options.resume_point {
        tasks = resume_at(tasks, point)?;
        tracing::info!("Resuming at {}: {} tasks remain", point, tasks.len());
    } else if options.resume_interrupted {
        if let Some((run_id, remaining)) = resume_interrupted(&sink, config, &config_hash, tasks.clone())? {
            tasks = remaining;
            resumed_run = Some(run_id);
        }
    }

    let run_id = match resumed_run {
        Some(run_id) => run_id,
        None => sink.begin_run(config.harvest.method.as_str(), &config_hash)?,
    };

    let batcher = DedupBatcher::preload(sink, config.harvest.batch_size)?;

    let (status, summary, mut sink) = match config.harvest.method {
        HarvestMethod::CcIndex => {
            let api = CommonCrawlApi::new(config.index.cc_index_url.clone());
            harvest_with(api, http, config, batcher, &tasks, run_id).await
        }
        HarvestMethod::Wayback => {
            let api = WaybackCdxApi::new(
                config.index.cdx_url.clone(),
                config.index.cdx_match_type.clone(),
                config.harvest.page_size,
            );
            harvest_with(api, http, config, batcher, &tasks, run_id).await
        }
    };

    sink.finish_run(run_id, status, summary.new_entities)?;

    if !summary.skipped.is_empty() {
        tracing::warn!("{} window(s) were skipped after splitting", summary.skipped.len());
    }
    tracing::info!(
        "Harvest run {} {}: {} new entities",
        run_id,
        status.to_db_string(),
        summary.new_entities
    );

    Ok(RunOutcome {
        run_id,
        status,
        summary,
    })
}

/// Finds the latest interrupted run and the tasks left after its checkpoint
fn resume_interrupted(
    sink: &SqliteSink,
    config: &Config,
    config_hash: &str,
    tasks: Vec<QueryTask>,
) -> Result<Option<(i64, Vec<QueryTask>)>, HarvestError> {
    let Some(run) = sink.latest_run()? else {
        tracing::info!("No previous runs found, starting new run");
        return Ok(None);
    };

    if !run.status.is_resumable() {
        tracing::info!("Latest run {} is {}, starting new run", run.id, run.status.to_db_string());
        return Ok(None);
    }

    if run.method != config.harvest.method.as_str() {
        tracing::warn!(
            "Latest run {} used method {}, starting new {} run",
            run.id,
            run.method,
            config.harvest.method
        );
        return Ok(None);
    }

    if run.config_hash != config_hash {
        tracing::warn!(
            "Configuration changed since run {} (hash {} -> {}); resuming anyway",
            run.id,
            run.config_hash,
            config_hash
        );
    }

    let remaining = match sink.last_checkpoint(run.id)? {
        Some(checkpoint) => {
            let point = ResumePoint {
                window: checkpoint.window,
                pattern: Some(checkpoint.pattern),
            };
            let remaining = resume_after(tasks, &point)?;
            tracing::info!(
                "Resuming interrupted run {} after {}: {} tasks remain",
                run.id,
                point,
                remaining.len()
            );
            remaining
        }
        None => {
            tracing::info!("Resuming interrupted run {} from the start", run.id);
            tasks
        }
    };

    Ok(Some((run.id, remaining)))
}

/// Runs `tasks` through one index until done or interrupted
async fn harvest_with<A: IndexApi>(
    api: A,
    http: Client,
    config: &Config,
    batcher: DedupBatcher<SqliteSink>,
    tasks: &[QueryTask],
    run_id: i64,
) -> (RunStatus, HarvestSummary, SqliteSink) {
    let source_tag = api.source_tag();
    let client = IndexClient::new(
        http,
        api,
        config.index.retry_policy(),
        config.harvest.max_pages,
    );
    let splitter = AdaptiveSplitter::new(client, config.harvest.split_on_failure);
    let mut harvester = Harvester::new(splitter, batcher, source_tag);

    let status = tokio::select! {
        _ = harvester.run(tasks, run_id) => RunStatus::Completed,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("Received Ctrl+C, flushing and stopping");
            RunStatus::Interrupted
        }
    };

    let (summary, sink) = harvester.finish();
    (status, summary, sink)
}
