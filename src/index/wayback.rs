//! Wayback Machine CDX API adapter
//!
//! Queries the CDX server with JSON output and continuation-token paging:
//!
//! ```text
//! GET {endpoint}?url=<pattern>&matchType=<mt>&output=json&fl=original
//!     &collapse=urlkey&from=YYYYMMDD&to=YYYYMMDD&limit=<n>&showResumeKey=true
//!     [&resumeKey=<token>]
//! ```
//!
//! The body is a JSON array of rows: a header row, the data rows, and, when
//! more results remain, an empty row followed by a one-element row holding
//! the resume key.

use crate::entity::SourceTag;
use crate::index::{IndexApi, IndexError, IndexPage};
use crate::plan::{PageCursor, QueryTask, Window};
use reqwest::{Client, RequestBuilder};

/// Adapter for the date-ranged Wayback CDX index
#[derive(Debug, Clone)]
pub struct WaybackCdxApi {
    endpoint: String,
    match_type: String,
    page_size: u32,
}

impl WaybackCdxApi {
    /// Creates an adapter for the CDX server at `endpoint`
    pub fn new(endpoint: impl Into<String>, match_type: impl Into<String>, page_size: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            match_type: match_type.into(),
            page_size,
        }
    }
}

impl IndexApi for WaybackCdxApi {
    fn source_tag(&self) -> SourceTag {
        SourceTag::Wayback
    }

    fn request(&self, client: &Client, task: &QueryTask) -> Result<RequestBuilder, IndexError> {
        let Window::Range(range) = &task.window else {
            return Err(IndexError::UnsupportedWindow(task.window.to_string()));
        };

        let from = range.from.format("%Y%m%d").to_string();
        let to = range.to.format("%Y%m%d").to_string();
        let limit = self.page_size.to_string();

        let mut params = vec![
            ("url", task.pattern.as_str()),
            ("matchType", self.match_type.as_str()),
            ("output", "json"),
            ("fl", "original"),
            ("collapse", "urlkey"),
            ("from", from.as_str()),
            ("to", to.as_str()),
            ("limit", limit.as_str()),
            ("showResumeKey", "true"),
        ];
        if let Some(PageCursor::Token(key)) = &task.page_cursor {
            params.push(("resumeKey", key.as_str()));
        }

        Ok(client.get(&self.endpoint).query(&params))
    }

    fn parse_page(&self, _task: &QueryTask, body: &str) -> Result<IndexPage, IndexError> {
        if body.trim().is_empty() {
            return Ok(IndexPage::default());
        }

        let rows: Vec<Vec<String>> =
            serde_json::from_str(body).map_err(|e| IndexError::Malformed(e.to_string()))?;

        let mut urls = Vec::new();
        let mut next = None;
        let mut rows = rows.into_iter().skip(1);

        while let Some(row) = rows.next() {
            if row.is_empty() {
                next = rows
                    .next()
                    .and_then(|key_row| key_row.into_iter().next())
                    .filter(|key| !key.is_empty())
                    .map(PageCursor::Token);
                break;
            }
            if let Some(original) = row.into_iter().next() {
                urls.push(original);
            }
        }

        Ok(IndexPage { urls, next })
    }
}
