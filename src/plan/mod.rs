//! Planning module: from a requested span to an ordered list of query tasks
//!
//! This module contains:
//! - Query task, window and cursor types
//! - The window planner (whole span, calendar month, or N-day windows)
//! - Resume handling over the planned sequence
//! - The Common Crawl snapshot directory

mod planner;
mod snapshots;
mod task;

pub use planner::{plan_range, plan_snapshots, resume_after, resume_at, split_range, ResumePoint};
pub use snapshots::{discover_snapshots, parse_collinfo, snapshots_for_year, CollectionInfo};
pub use task::{DateRange, Granularity, PageCursor, QueryTask, Window};
