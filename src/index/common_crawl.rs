//! Common Crawl index API adapter
//!
//! Queries `GET {base}/{snapshot}-index?url=<pattern>&output=json&page=<n>`.
//! The body holds one JSON capture record per line. Pages are numbered from
//! zero; an empty body, or a 400 for a page past the end, ends the task.

use crate::entity::SourceTag;
use crate::index::{classify_status, IndexApi, IndexError, IndexPage, StatusClass};
use crate::plan::{PageCursor, QueryTask, Window};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

/// The fields of a capture record this crate reads
#[derive(Debug, Deserialize)]
struct CaptureRecord {
    #[serde(default)]
    url: Option<String>,
}

/// Adapter for the per-snapshot Common Crawl index
#[derive(Debug, Clone)]
pub struct CommonCrawlApi {
    base_url: String,
}

impl CommonCrawlApi {
    /// Creates an adapter for the index server at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn page_number(task: &QueryTask) -> u32 {
        match task.page_cursor {
            Some(PageCursor::Page(n)) => n,
            _ => 0,
        }
    }
}

impl IndexApi for CommonCrawlApi {
    fn source_tag(&self) -> SourceTag {
        SourceTag::CommonCrawl
    }

    fn request(&self, client: &Client, task: &QueryTask) -> Result<RequestBuilder, IndexError> {
        let Window::Snapshot(snapshot) = &task.window else {
            return Err(IndexError::UnsupportedWindow(task.window.to_string()));
        };

        let page = Self::page_number(task).to_string();
        Ok(client
            .get(format!("{}/{}-index", self.base_url, snapshot))
            .query(&[
                ("url", task.pattern.as_str()),
                ("output", "json"),
                ("page", page.as_str()),
            ]))
    }

    fn parse_page(&self, task: &QueryTask, body: &str) -> Result<IndexPage, IndexError> {
        let mut urls = Vec::new();
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record: CaptureRecord = serde_json::from_str(line)
                .map_err(|e| IndexError::Malformed(format!("{}: {}", e, line)))?;
            if let Some(url) = record.url {
                urls.push(url);
            }
        }

        let next = if urls.is_empty() {
            None
        } else {
            Some(PageCursor::Page(Self::page_number(task) + 1))
        };

        Ok(IndexPage { urls, next })
    }

    /// A 404 carries "No Captures found" for patterns absent from a snapshot
    fn classify_status(&self, status: StatusCode) -> StatusClass {
        if status == StatusCode::NOT_FOUND {
            StatusClass::DefinitiveEmpty
        } else {
            classify_status(status)
        }
    }
}
