//! Snapshot directory for the Common Crawl index
//!
//! The index publishes its crawl generations in `collinfo.json`. A local copy
//! can be supplied to avoid the remote fetch; when a cache path is configured
//! but the file does not exist yet, the remote listing is written there.

use crate::{HarvestError, PlanError};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;

/// One entry of `collinfo.json`; only the id is needed
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
}

/// Selects the snapshot ids belonging to `year`, sorted and deduplicated
pub fn snapshots_for_year(collections: &[CollectionInfo], year: i32) -> Vec<String> {
    let prefix = format!("CC-MAIN-{}-", year);
    let mut ids: Vec<String> = collections
        .iter()
        .filter(|c| c.id.starts_with(&prefix))
        .map(|c| c.id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Parses the body of `collinfo.json`
pub fn parse_collinfo(body: &str) -> Result<Vec<CollectionInfo>, HarvestError> {
    Ok(serde_json::from_str(body)?)
}

/// Resolves a year to its snapshot ids
///
/// Reads `cache_path` if it exists, otherwise fetches `collinfo_url` (and
/// writes the body to `cache_path` when one is given).
///
/// # Returns
///
/// * `Ok(Vec<String>)` - Sorted snapshot ids for the year (never empty)
/// * `Err(HarvestError)` - Directory unavailable, unparsable, or no snapshot
///   matches the year
pub async fn discover_snapshots(
    client: &Client,
    collinfo_url: &str,
    cache_path: Option<&Path>,
    year: i32,
) -> Result<Vec<String>, HarvestError> {
    let body = match cache_path {
        Some(path) if path.exists() => {
            tracing::info!("Reading snapshot directory from {}", path.display());
            std::fs::read_to_string(path)?
        }
        _ => {
            let body = fetch_collinfo(client, collinfo_url).await?;
            if let Some(path) = cache_path {
                std::fs::write(path, &body)?;
                tracing::info!("Cached snapshot directory at {}", path.display());
            }
            body
        }
    };

    let snapshots = snapshots_for_year(&parse_collinfo(&body)?, year);
    if snapshots.is_empty() {
        return Err(PlanError::NoSnapshots(year).into());
    }

    tracing::info!("Found {} snapshots for year {}", snapshots.len(), year);
    Ok(snapshots)
}

async fn fetch_collinfo(client: &Client, collinfo_url: &str) -> Result<String, HarvestError> {
    tracing::info!("Fetching snapshot directory from {}", collinfo_url);
    let response = client.get(collinfo_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::SnapshotDirectory(format!(
            "{} returned HTTP {}",
            collinfo_url, status
        )));
    }
    Ok(response.text().await?)
}
