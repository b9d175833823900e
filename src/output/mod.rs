//! Output module for reporting harvest results
//!
//! This module handles:
//! - Reading entity and run statistics back from the sink
//! - Printing the end-of-run summary

pub mod stats;

pub use stats::{load_statistics, print_harvest_summary, print_statistics, HarvestStatistics};
