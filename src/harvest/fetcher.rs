//! Index client
//!
//! This module executes one query task against a remote index, including:
//! - Building the HTTP client with a proper user agent string
//! - Paging until the index signals exhaustion
//! - Retrying transient failures of a page with exponential backoff
//! - Classifying a task as completed, truncated or failed

use crate::config::UserAgentConfig;
use crate::harvest::retry::{retry_after, RetryPolicy};
use crate::index::{IndexApi, IndexPage, StatusClass};
use crate::plan::QueryTask;
use reqwest::Client;
use std::time::Duration;

/// Final state of one task after all of its pages were requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every page was fetched (a definitive-empty response counts as zero pages)
    Completed {
        /// Number of non-empty pages handed to the page callback
        pages: u32,
        /// Number of raw URLs handed to the page callback
        urls: u64,
    },

    /// The page limit was hit while the index still had more pages;
    /// everything before the limit was delivered
    Truncated {
        pages: u32,
        urls: u64,
    },

    /// A page kept failing; pages delivered before it stay delivered
    Failed {
        /// Description of the last failure
        reason: String,
    },
}

/// Result of requesting a single page
#[derive(Debug)]
pub enum PageFetch {
    /// The page was read and parsed in full
    Page(IndexPage),
    /// The index answered "bad request / unsupported" for this task
    Empty,
    /// The page could not be fetched within the retry budget
    Failed(String),
}

/// Anything that can run a query task to completion, page by page
///
/// `on_page` receives every page's raw URLs in page order, together with the
/// task positioned at that page.
#[allow(async_fn_in_trait)]
pub trait TaskExecutor {
    async fn execute(
        &self,
        task: &QueryTask,
        on_page: &mut dyn FnMut(&QueryTask, Vec<String>),
    ) -> TaskOutcome;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use channel_harvest::config::UserAgentConfig;
/// use channel_harvest::harvest::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig::default();
/// let client = build_http_client(&config, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Executes query tasks against one index with retry and paging
pub struct IndexClient<A> {
    http: Client,
    api: A,
    retry: RetryPolicy,
    max_pages: u32,
}

impl<A: IndexApi> IndexClient<A> {
    /// Creates a client
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client
    /// * `api` - Adapter for the index dialect
    /// * `retry` - Per-page retry policy
    /// * `max_pages` - Upper bound on pages requested per task
    pub fn new(http: Client, api: A, retry: RetryPolicy, max_pages: u32) -> Self {
        Self {
            http,
            api,
            retry,
            max_pages,
        }
    }

    /// Fetches the page `task.page_cursor` points at, retrying transient failures
    pub async fn fetch_page(&self, task: &QueryTask) -> PageFetch {
        let mut backoff = self.retry.initial_backoff;
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.retry.max_attempts {
            let request = match self.api.request(&self.http, task) {
                Ok(request) => request,
                Err(e) => return PageFetch::Failed(e.to_string()),
            };

            let hint = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match self.api.classify_status(status) {
                        StatusClass::Success => match response.text().await {
                            Ok(body) => match self.api.parse_page(task, &body) {
                                Ok(page) => return PageFetch::Page(page),
                                Err(e) => {
                                    last_failure = e.to_string();
                                    None
                                }
                            },
                            Err(e) => {
                                last_failure = format!("failed to read body: {}", e);
                                None
                            }
                        },
                        StatusClass::DefinitiveEmpty => {
                            tracing::debug!("{} answered HTTP {}, treating as no results", task, status);
                            return PageFetch::Empty;
                        }
                        StatusClass::Transient => {
                            last_failure = format!("HTTP {}", status);
                            retry_after(response.headers())
                        }
                        StatusClass::Fatal => {
                            return PageFetch::Failed(format!("HTTP {}", status));
                        }
                    }
                }
                Err(e) => {
                    last_failure = if e.is_timeout() {
                        "request timeout".to_string()
                    } else {
                        e.to_string()
                    };
                    None
                }
            };

            if attempt == self.retry.max_attempts {
                break;
            }

            let delay = self.retry.delay(backoff, hint);
            tracing::warn!(
                "Retry {}/{} for {} page {:?} in {:?}: {}",
                attempt,
                self.retry.max_attempts - 1,
                task,
                task.page_cursor,
                delay,
                last_failure
            );
            tokio::time::sleep(delay).await;
            backoff = self.retry.next_backoff(backoff);
        }

        PageFetch::Failed(format!(
            "{} after {} attempts",
            last_failure, self.retry.max_attempts
        ))
    }
}

impl<A: IndexApi> TaskExecutor for IndexClient<A> {
    async fn execute(
        &self,
        task: &QueryTask,
        on_page: &mut dyn FnMut(&QueryTask, Vec<String>),
    ) -> TaskOutcome {
        let mut current = task.clone();
        let mut pages = 0u32;
        let mut urls = 0u64;
        let mut requested = 0u32;

        loop {
            if requested >= self.max_pages {
                tracing::warn!(
                    "Stopping {} at the {}-page limit with pages remaining",
                    task,
                    self.max_pages
                );
                return TaskOutcome::Truncated { pages, urls };
            }
            requested += 1;

            match self.fetch_page(&current).await {
                PageFetch::Page(page) => {
                    let next = page.next;
                    if !page.urls.is_empty() {
                        pages += 1;
                        urls += page.urls.len() as u64;
                        tracing::info!("{} page {:?}: {} urls", task, current.page_cursor, page.urls.len());
                        on_page(&current, page.urls);
                    }

                    match next {
                        Some(cursor) if current.page_cursor.as_ref() != Some(&cursor) => {
                            current = current.at(cursor);
                        }
                        Some(cursor) => {
                            tracing::warn!("{} returned its own cursor {:?} again, stopping", task, cursor);
                            break;
                        }
                        None => break,
                    }
                }
                PageFetch::Empty => break,
                PageFetch::Failed(reason) => {
                    tracing::warn!("{} failed at page {:?}: {}", task, current.page_cursor, reason);
                    return TaskOutcome::Failed { reason };
                }
            }
        }

        TaskOutcome::Completed { pages, urls }
    }
}
