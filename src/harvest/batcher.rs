//! Dedup batcher
//!
//! Keeps the set of identities already stored or queued, drops repeats, and
//! writes new entities to the sink in fixed-size batches.
//!
//! An identity enters the seen set when it is queued. When the sink refuses a
//! row for any reason other than "already present", the identity is taken
//! back out of the set so a later sighting can try again. If the whole batch
//! fails, every identity of the batch is taken back out.

use crate::entity::CanonicalEntity;
use crate::storage::{RowErrorKind, Sink, StorageResult};
use std::collections::HashSet;

/// Identities known to be stored or queued for storage
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    identities: HashSet<String>,
}

impl SeenSet {
    pub fn new(identities: HashSet<String>) -> Self {
        Self { identities }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    /// Marks `identity` as seen; returns false if it already was
    pub fn insert(&mut self, identity: &str) -> bool {
        if self.identities.contains(identity) {
            return false;
        }
        self.identities.insert(identity.to_string())
    }

    pub fn remove(&mut self, identity: &str) -> bool {
        self.identities.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// What happened to an offered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Already stored or queued; dropped
    Duplicate,
    /// Queued for the next batch
    Queued,
}

/// Outcome of one flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entities submitted to the sink
    pub attempted: usize,
    /// Entities the sink stored
    pub inserted: usize,
    /// Rows the sink already held
    pub already_present: usize,
    /// Rows the sink refused; their identities are no longer seen
    pub rejected: usize,
    /// Set when the whole batch failed
    pub error: Option<String>,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.attempted += other.attempted;
        self.inserted += other.inserted;
        self.already_present += other.already_present;
        self.rejected += other.rejected;
        if other.error.is_some() {
            self.error = other.error;
        }
    }

    /// True when something was submitted but not stored
    pub fn has_failures(&self) -> bool {
        self.rejected > 0 || self.error.is_some()
    }
}

/// Deduplicates entities and writes them to a sink in batches
pub struct DedupBatcher<S> {
    sink: S,
    seen: SeenSet,
    pending: Vec<CanonicalEntity>,
    batch_size: usize,
    totals: FlushReport,
}

impl<S: Sink> DedupBatcher<S> {
    /// Creates a batcher whose seen set is preloaded from the sink
    ///
    /// # Arguments
    ///
    /// * `sink` - The store new entities are written to
    /// * `batch_size` - Entities per insert; values below 1 are treated as 1
    pub fn preload(sink: S, batch_size: usize) -> StorageResult<Self> {
        let identities = sink.load_identities()?;
        tracing::info!("Loaded {} known identities from sink", identities.len());
        Ok(Self {
            sink,
            seen: SeenSet::new(identities),
            pending: Vec::with_capacity(batch_size.max(1)),
            batch_size: batch_size.max(1),
            totals: FlushReport::default(),
        })
    }

    /// Offers an entity; flushes automatically once a batch is full
    pub fn offer(&mut self, entity: CanonicalEntity) -> Offer {
        if !self.seen.insert(&entity.identity) {
            return Offer::Duplicate;
        }

        self.pending.push(entity);
        if self.pending.len() >= self.batch_size {
            self.flush();
        }
        Offer::Queued
    }

    /// Writes every pending entity to the sink
    ///
    /// Never fails: sink problems are logged, counted, and undone in the
    /// seen set.
    pub fn flush(&mut self) -> FlushReport {
        if self.pending.is_empty() {
            return FlushReport::default();
        }

        let batch = std::mem::take(&mut self.pending);
        let mut report = FlushReport {
            attempted: batch.len(),
            ..Default::default()
        };

        match self.sink.insert_batch(&batch) {
            Ok(result) => {
                report.inserted = result.inserted;
                for row in result.errors {
                    match row.kind {
                        RowErrorKind::AlreadyPresent => report.already_present += 1,
                        RowErrorKind::Rejected => {
                            tracing::warn!("Sink rejected {}: {}", row.identity, row.message);
                            self.seen.remove(&row.identity);
                            report.rejected += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!("Batch of {} entities failed: {}", batch.len(), e);
                for entity in &batch {
                    self.seen.remove(&entity.identity);
                }
                report.rejected = batch.len();
                report.error = Some(e.to_string());
            }
        }

        tracing::debug!(
            "Flushed {} entities: {} inserted, {} already present, {} rejected",
            report.attempted,
            report.inserted,
            report.already_present,
            report.rejected
        );
        self.totals.absorb(report.clone());
        report
    }

    /// Sum of every flush so far
    pub fn totals(&self) -> &FlushReport {
        &self.totals
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Flushes whatever is pending and hands the sink back
    pub fn into_sink(mut self) -> S {
        self.flush();
        self.sink
    }
}
