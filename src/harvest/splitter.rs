//! Adaptive splitter
//!
//! A date-range task that keeps failing is usually too large for the index to
//! answer in time. Instead of giving up, the splitter bisects the window and
//! runs each half, recursing until a half succeeds or shrinks to a single day.
//! A window that hits the page limit is treated the same way: its halves
//! hold fewer captures each. Work is kept on an explicit stack so deep splits
//! cannot grow the call stack.

use crate::harvest::fetcher::{TaskExecutor, TaskOutcome};
use crate::plan::QueryTask;

/// A window that could not be harvested, even after splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    pub task: QueryTask,
    pub reason: String,
}

/// What happened to one planned task and all of its sub-windows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
    /// Sub-tasks (including the task itself) that completed
    pub completed: usize,

    /// Minimal windows that still failed
    pub skipped: Vec<SkippedTask>,

    /// Deepest split level reached; 0 when the task never split
    pub max_depth: u32,

    /// Raw URLs delivered across every completed or partial sub-task
    pub urls: u64,
}

impl SplitReport {
    /// True when every part of the task's window was harvested
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Runs tasks through an executor, bisecting range windows on failure
pub struct AdaptiveSplitter<E> {
    executor: E,
    split_on_failure: bool,
}

impl<E: TaskExecutor> AdaptiveSplitter<E> {
    /// Creates a splitter
    ///
    /// With `split_on_failure` off, a failed task is skipped immediately.
    pub fn new(executor: E, split_on_failure: bool) -> Self {
        Self {
            executor,
            split_on_failure,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Harvests `task`, splitting its window as needed
    ///
    /// Sub-windows run in chronological order, so pages reach `on_page` in
    /// the same order an unsplit task would deliver them.
    pub async fn harvest(
        &self,
        task: &QueryTask,
        on_page: &mut dyn FnMut(&QueryTask, Vec<String>),
    ) -> SplitReport {
        let mut report = SplitReport::default();
        let mut stack = vec![(task.clone(), 0u32)];

        while let Some((current, depth)) = stack.pop() {
            report.max_depth = report.max_depth.max(depth);

            let mut delivered = 0u64;
            let outcome = self
                .executor
                .execute(&current, &mut |at, urls| {
                    delivered += urls.len() as u64;
                    on_page(at, urls)
                })
                .await;
            report.urls += delivered;

            let reason = match outcome {
                TaskOutcome::Completed { .. } => {
                    report.completed += 1;
                    continue;
                }
                TaskOutcome::Truncated { pages, .. } => {
                    format!("page limit reached after {} pages", pages)
                }
                TaskOutcome::Failed { reason } => reason,
            };

            match current.bisect().filter(|_| self.split_on_failure) {
                Some((left, right)) => {
                    tracing::info!(
                        "Splitting {} into {} and {}: {}",
                        current,
                        left.window,
                        right.window,
                        reason
                    );
                    stack.push((right, depth + 1));
                    stack.push((left, depth + 1));
                }
                None => {
                    tracing::error!("Skipping {}: {}", current, reason);
                    report.skipped.push(SkippedTask {
                        task: current,
                        reason,
                    });
                }
            }
        }

        report
    }
}
