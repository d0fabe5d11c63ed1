//! Lazy traversal of paginated list endpoints.
//!
//! # Design
//! A walk is a `futures` stream over raw JSON records. Each pull drains the
//! records buffered from the current page; only when the buffer is empty is
//! the next page fetched, so a consumer that stops early never triggers
//! further requests.
//!
//! The pagination strategy is fixed when the walker is built:
//!
//! - `page_param` set: the walker increments that query parameter until it
//!   gets an empty page and never looks at the `next` link;
//! - otherwise, `next_key` set: the walker follows the server's absolute
//!   `next` URL with no query parameters of its own;
//! - otherwise only the first page is read.
//!
//! A response without the results key is a non-paginated endpoint: an
//! object is one record, an array is a list of records, and the walk ends.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::entity::kind;
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpClient, Query};

/// Keys and page numbering of a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Key of the record array in a page envelope.
    pub results_key: String,
    /// Key of the next-page link; `None` disables link-following.
    pub next_key: Option<String>,
    /// Query parameter carrying the page number; enables page-number mode.
    pub page_param: Option<String>,
    pub first_page: i64,
    /// Key of the total record count, used for progress reports.
    pub count_key: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            results_key: "results".to_string(),
            next_key: Some("next".to_string()),
            page_param: None,
            first_page: 1,
            count_key: "count".to_string(),
        }
    }
}

impl PaginationConfig {
    /// Page-number mode on `param`.
    pub fn page_numbers(param: &str) -> Self {
        Self {
            page_param: Some(param.to_string()),
            ..Self::default()
        }
    }

    /// Reads only the first page.
    pub fn single_page() -> Self {
        Self {
            next_key: None,
            ..Self::default()
        }
    }

    fn strategy(&self) -> Strategy {
        match (&self.page_param, &self.next_key) {
            (Some(param), _) => Strategy::PageNumber(param.clone()),
            (None, Some(key)) => Strategy::FollowNext(key.clone()),
            (None, None) => Strategy::SinglePage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    FollowNext(String),
    PageNumber(String),
    SinglePage,
}

/// Progress of a page-number walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProgress {
    pub path: String,
    pub total_records: u64,
    pub page: i64,
    pub total_pages: u64,
}

/// Receives a report after each page of a page-number walk.
///
/// An error ends the walk and is handed to the consumer.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    async fn report(&self, progress: &PageProgress) -> ApiResult<()>;
}

/// Logs progress at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

#[async_trait]
impl ProgressCallback for LogProgress {
    async fn report(&self, progress: &PageProgress) -> ApiResult<()> {
        info!(
            path = %progress.path,
            total_records = progress.total_records,
            page = progress.page,
            total_pages = progress.total_pages,
            "paginated fetch progress"
        );
        Ok(())
    }
}

/// `ceil(count / page_size)`, `None` for an empty page size.
pub fn total_pages(count: u64, page_size: usize) -> Option<u64> {
    (page_size > 0).then(|| count.div_ceil(page_size as u64))
}

/// Walks one paginated resource at a time over an `HttpClient`.
#[derive(Clone)]
pub struct PageWalker {
    client: Arc<dyn HttpClient>,
    config: PaginationConfig,
    strategy: Strategy,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for PageWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWalker")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl PageWalker {
    pub fn new(client: Arc<dyn HttpClient>, config: PaginationConfig) -> Self {
        let strategy = config.strategy();
        Self {
            client,
            config,
            strategy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replaces the configuration, keeping the client and progress callback.
    pub fn with_config(mut self, config: PaginationConfig) -> Self {
        self.strategy = config.strategy();
        self.config = config;
        self
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Lazily yields every record of `path`, page by page.
    ///
    /// Each call starts a fresh walk from the first page.
    pub fn walk(&self, path: &str, query: Query) -> BoxStream<'static, ApiResult<Value>> {
        let page = match &self.strategy {
            Strategy::PageNumber(param) => query
                .iter()
                .find(|(key, _)| key == param)
                .and_then(|(_, value)| value.parse().ok())
                .unwrap_or(self.config.first_page),
            _ => self.config.first_page,
        };
        let walk = Walk {
            walker: self.clone(),
            path: path.to_string(),
            next: Some(PageRequest {
                address: path.to_string(),
                query,
                page,
            }),
            buffer: VecDeque::new(),
            page_size: None,
            pending_progress: None,
        };
        stream::try_unfold(walk, |mut walk| async move {
            let record = walk.pull().await?;
            Ok(record.map(|record| (record, walk)))
        })
        .boxed()
    }

    /// Collects a whole walk into memory.
    pub async fn collect(&self, path: &str, query: Query) -> ApiResult<Vec<Value>> {
        let started = Instant::now();
        let records: Vec<Value> = self.walk(path, query).try_collect().await?;
        info!(
            path = %path,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "paginated fetch complete"
        );
        Ok(records)
    }
}

#[derive(Debug)]
struct PageRequest {
    address: String,
    query: Query,
    page: i64,
}

/// State of one walk; `next == None` means no further fetch.
struct Walk {
    walker: PageWalker,
    path: String,
    next: Option<PageRequest>,
    buffer: VecDeque<Value>,
    page_size: Option<usize>,
    pending_progress: Option<PageProgress>,
}

impl Walk {
    async fn pull(&mut self) -> ApiResult<Option<Value>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if let (Some(progress), Some(callback)) =
                (self.pending_progress.take(), self.walker.progress.as_ref())
            {
                callback.report(&progress).await?;
            }
            let Some(request) = self.next.take() else {
                return Ok(None);
            };
            debug!(
                path = %self.path,
                address = %request.address,
                page = request.page,
                "fetching page"
            );
            let page = self
                .walker
                .client
                .get(&request.address, &request.query)
                .await?;
            self.absorb(request, page)?;
        }
    }

    fn absorb(&mut self, request: PageRequest, page: Value) -> ApiResult<()> {
        let results_key = self.walker.config.results_key.clone();
        match page {
            Value::Object(mut envelope) => match envelope.remove(&results_key) {
                Some(Value::Array(records)) if records.is_empty() => {
                    debug!(path = %self.path, page = request.page, "empty page, walk finished");
                }
                Some(Value::Array(records)) => {
                    let page_size = *self.page_size.get_or_insert(records.len());
                    self.buffer.extend(records);
                    self.pending_progress = self.progress_for(&envelope, request.page, page_size);
                    self.next = self.advance(&envelope, request)?;
                }
                Some(other) => {
                    return Err(ApiError::MalformedPage(format!(
                        "`{results_key}` of {} is {}, expected an array",
                        self.path,
                        kind(&other)
                    )));
                }
                None => self.buffer.push_back(Value::Object(envelope)),
            },
            Value::Array(records) => self.buffer.extend(records),
            other => {
                return Err(ApiError::MalformedPage(format!(
                    "{} returned {}, expected an object or an array",
                    self.path,
                    kind(&other)
                )));
            }
        }
        Ok(())
    }

    fn progress_for(
        &self,
        envelope: &Map<String, Value>,
        page: i64,
        page_size: usize,
    ) -> Option<PageProgress> {
        if self.walker.progress.is_none() || !matches!(self.walker.strategy, Strategy::PageNumber(_)) {
            return None;
        }
        let count = envelope.get(&self.walker.config.count_key)?.as_u64()?;
        Some(PageProgress {
            path: self.path.clone(),
            total_records: count,
            page,
            total_pages: total_pages(count, page_size)?,
        })
    }

    fn advance(
        &self,
        envelope: &Map<String, Value>,
        request: PageRequest,
    ) -> ApiResult<Option<PageRequest>> {
        match &self.walker.strategy {
            Strategy::FollowNext(next_key) => match envelope.get(next_key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(url)) => Ok(Some(PageRequest {
                    address: url.clone(),
                    query: Query::new(),
                    page: request.page + 1,
                })),
                Some(other) => Err(ApiError::MalformedPage(format!(
                    "`{next_key}` of {} is {}, expected a URL",
                    self.path,
                    kind(other)
                ))),
            },
            Strategy::PageNumber(param) => {
                let page = request.page + 1;
                let mut query = request.query;
                query.retain(|(key, _)| key != param);
                query.push((param.clone(), page.to_string()));
                Ok(Some(PageRequest {
                    address: request.address,
                    query,
                    page,
                }))
            }
            Strategy::SinglePage => Ok(None),
        }
    }
}
