//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::entity::SourceTag;
use crate::harvest::HarvestSummary;
use crate::storage::{RunRecord, Sink};
use crate::HarvestError;
use chrono::{DateTime, Utc};

/// Number of runs listed by `--stats`
pub const RECENT_RUN_LIMIT: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of stored entities
    pub total_entities: u64,

    /// Stored entities per source index
    pub entities_by_source: Vec<(SourceTag, u64)>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `sink` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(sink: &dyn Sink) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        total_entities: sink.count_entities()?,
        entities_by_source: sink.count_entities_by_source()?,
        recent_runs: sink.recent_runs(RECENT_RUN_LIMIT)?,
    })
}

/// Wall-clock duration of a finished run in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<u64> {
    let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = run.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
    u64::try_from((finished - started).num_seconds()).ok()
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Entities:");
    println!("  Total: {}", stats.total_entities);
    for (source, count) in &stats.entities_by_source {
        let percentage = if stats.total_entities > 0 {
            (*count as f64 / stats.total_entities as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", source, count, percentage);
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        let duration = run_duration_seconds(run)
            .map(|secs| format!("{}s", secs))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{} {} {} started {} ({}, {} new)",
            run.id,
            run.method,
            run.status.to_db_string(),
            run.started_at,
            duration,
            run.new_entities
        );
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_harvest_summary(summary: &HarvestSummary) {
    println!("\n=== Harvest Summary ===\n");
    println!("  Tasks: {} ({} complete)", summary.tasks, summary.completed_tasks);
    println!("  Raw URLs: {}", summary.raw_urls);
    println!("  Rejected URLs: {}", summary.rejected_urls);
    println!("  Duplicates: {}", summary.duplicates);
    println!("  New entities: {}", summary.new_entities);
    if summary.already_present > 0 {
        println!("  Already present in sink: {}", summary.already_present);
    }
    if summary.sink_failures > 0 {
        println!("  Sink failures: {}", summary.sink_failures);
    }

    if !summary.skipped.is_empty() {
        println!("\nSkipped windows ({}):", summary.skipped.len());
        for skipped in &summary.skipped {
            println!("  - {}: {}", skipped.task, skipped.reason);
        }
    }
}
