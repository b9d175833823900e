//! Remote index adapters
//!
//! Each historical index speaks its own query dialect and page format. An
//! adapter only knows how to build the request for one page of a task and how
//! to parse the response body; sending, retrying and paging live in
//! `harvest::IndexClient`.

mod common_crawl;
mod wayback;

pub use common_crawl::CommonCrawlApi;
pub use wayback::WaybackCdxApi;

use crate::entity::SourceTag;
use crate::plan::{PageCursor, QueryTask};
use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;

/// Errors produced while building a request or reading a page
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Window {0} is not supported by this index")]
    UnsupportedWindow(String),

    #[error("Malformed page: {0}")]
    Malformed(String),
}

/// One successfully parsed page of results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPage {
    /// Raw capture URLs in index order
    pub urls: Vec<String>,

    /// Cursor of the following page; None when the index signals exhaustion
    pub next: Option<PageCursor>,
}

/// How the client should react to an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Read and parse the body
    Success,
    /// Bad request or unsupported pattern: zero results, not an error
    DefinitiveEmpty,
    /// Network-level trouble, 5xx or 429: retry the same page
    Transient,
    /// Anything else: fail the task without retrying
    Fatal,
}

/// Default status classification shared by all indexes
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | Success |
/// | 400 | DefinitiveEmpty |
/// | 429 | Transient |
/// | 5xx | Transient |
/// | other | Fatal |
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::BAD_REQUEST {
        StatusClass::DefinitiveEmpty
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Transient
    } else {
        StatusClass::Fatal
    }
}

/// Query dialect of one remote index
pub trait IndexApi {
    /// Tag recorded on every entity harvested through this index
    fn source_tag(&self) -> SourceTag;

    /// Builds the request for the page `task.page_cursor` points at
    fn request(&self, client: &Client, task: &QueryTask) -> Result<RequestBuilder, IndexError>;

    /// Parses a successful response body
    fn parse_page(&self, task: &QueryTask, body: &str) -> Result<IndexPage, IndexError>;

    /// Classifies a response status
    fn classify_status(&self, status: StatusCode) -> StatusClass {
        classify_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), StatusClass::Success);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), StatusClass::DefinitiveEmpty);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), StatusClass::Transient);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), StatusClass::Transient);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), StatusClass::Transient);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), StatusClass::Fatal);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::Fatal);
    }
}
