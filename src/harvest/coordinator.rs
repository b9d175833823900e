//! Harvest coordinator - main harvest orchestration logic
//!
//! Drives planned tasks through the splitter, canonicalizes every raw URL
//! each page yields, and offers the results to the dedup batcher. After each
//! task the batch is flushed and a checkpoint is written, so stopping between
//! tasks never loses work.

use crate::entity::{CanonicalEntity, SourceTag};
use crate::harvest::batcher::{DedupBatcher, Offer};
use crate::harvest::fetcher::TaskExecutor;
use crate::harvest::splitter::{AdaptiveSplitter, SkippedTask};
use crate::plan::QueryTask;
use crate::storage::Sink;
use crate::url::Canonicalizer;

/// Counters for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Planned tasks processed
    pub tasks: usize,
    /// Planned tasks harvested without any skipped sub-window
    pub completed_tasks: usize,
    /// Minimal windows that failed even after splitting
    pub skipped: Vec<SkippedTask>,
    /// Raw URLs received from the index
    pub raw_urls: u64,
    /// Raw URLs the canonicalizer rejected
    pub rejected_urls: u64,
    /// Canonical identities already stored or already queued
    pub duplicates: u64,
    /// Entities newly written to the sink
    pub new_entities: u64,
    /// Rows the sink already held when the batch arrived
    pub already_present: u64,
    /// Rows the sink refused or lost to a failed batch
    pub sink_failures: u64,
}

/// Main harvest coordinator structure
pub struct Harvester<E, S> {
    splitter: AdaptiveSplitter<E>,
    batcher: DedupBatcher<S>,
    canonicalizer: Canonicalizer,
    source_tag: SourceTag,
    summary: HarvestSummary,
}

impl<E: TaskExecutor, S: Sink> Harvester<E, S> {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `splitter` - Executes tasks, splitting failed windows
    /// * `batcher` - Preloaded dedup batcher owning the sink
    /// * `source_tag` - Tag recorded on every new entity
    pub fn new(splitter: AdaptiveSplitter<E>, batcher: DedupBatcher<S>, source_tag: SourceTag) -> Self {
        Self {
            splitter,
            batcher,
            canonicalizer: Canonicalizer::default(),
            source_tag,
            summary: HarvestSummary::default(),
        }
    }

    /// Runs every task in order
    ///
    /// Checkpoints are written under `run_id`. Sink problems are logged and
    /// counted; they never abort the run.
    pub async fn run(&mut self, tasks: &[QueryTask], run_id: i64) {
        let total = tasks.len();
        tracing::info!("Starting harvest run {} with {} tasks", run_id, total);

        for (position, task) in tasks.iter().enumerate() {
            self.run_task(task).await;

            let report = self.batcher.flush();
            if let Some(error) = report.error {
                tracing::error!("Sink write failed after {}: {}", task, error);
            }

            let window = task.window.label();
            if let Err(e) = self
                .batcher
                .sink_mut()
                .record_checkpoint(run_id, &window, &task.pattern)
            {
                tracing::error!("Failed to record checkpoint for {}: {}", task, e);
            }

            tracing::info!(
                "[{}/{}] {} done: {} new entities so far, {} raw URLs",
                position + 1,
                total,
                task,
                self.batcher.totals().inserted,
                self.summary.raw_urls
            );
        }
    }

    async fn run_task(&mut self, task: &QueryTask) {
        let Self {
            splitter,
            batcher,
            canonicalizer,
            source_tag,
            summary,
        } = self;
        let source_tag = *source_tag;

        let mut rejected = 0u64;
        let mut duplicates = 0u64;
        let report = splitter
            .harvest(task, &mut |_, urls| {
                for raw in urls {
                    match canonicalizer.canonicalize(&raw) {
                        Ok(identity) => {
                            let entity = CanonicalEntity::new(identity, source_tag);
                            if batcher.offer(entity) == Offer::Duplicate {
                                duplicates += 1;
                            }
                        }
                        Err(reason) => {
                            tracing::trace!("Rejected {}: {}", raw, reason);
                            rejected += 1;
                        }
                    }
                }
            })
            .await;

        summary.tasks += 1;
        summary.raw_urls += report.urls;
        summary.rejected_urls += rejected;
        summary.duplicates += duplicates;
        if report.is_complete() {
            summary.completed_tasks += 1;
        } else {
            tracing::warn!(
                "{} finished with {} skipped window(s)",
                task,
                report.skipped.len()
            );
        }
        summary.skipped.extend(report.skipped);
    }

    /// Flushes the remainder and returns the final counters with the sink
    pub fn finish(mut self) -> (HarvestSummary, S) {
        self.batcher.flush();

        let totals = self.batcher.totals();
        self.summary.new_entities = totals.inserted as u64;
        self.summary.already_present = totals.already_present as u64;
        self.summary.sink_failures = totals.rejected as u64;

        (self.summary, self.batcher.into_sink())
    }

    /// Counters so far; entity totals are final only after [`Harvester::finish`]
    pub fn summary(&self) -> &HarvestSummary {
        &self.summary
    }
}
