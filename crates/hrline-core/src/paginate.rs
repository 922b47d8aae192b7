//! Pagination engine: drives page fetches for one resource until exhaustion.
//!
//! Each strategy defines two operations:
//! - `build_request(cursor)`: query parameters carrying the cursor
//! - `advance(cursor, response)`: next cursor, or `None` when terminal
//!
//! [`Pages`] yields one page of records per fetch, so at most one page is
//! held in memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::TokenManager;
use crate::error::PipelineError;
use crate::http::{HttpResponse, Transport, join_url};
use crate::json_path::{self, Numeric};
use crate::resource::{Record, ResourceSpec};
use crate::retry::{RetryPolicy, retry_transient};

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_base_page() -> u64 {
    1
}

/// Cursor strategy for a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// One fetch, no cursor
    #[default]
    SinglePage,
    /// Cursor = record offset, advanced by `limit`
    #[serde(alias = "offset")]
    OffsetLimit {
        limit: u64,
        #[serde(default)]
        initial_offset: u64,
        /// Total record count in the response. Without it, a short page ends the sequence.
        #[serde(default)]
        total_path: Option<String>,
        #[serde(default = "default_offset_param")]
        offset_param: String,
        #[serde(default = "default_limit_param")]
        limit_param: String,
    },
    /// Cursor = page number starting at `base_page`, advanced by 1
    PageNumber {
        #[serde(default = "default_base_page")]
        base_page: u64,
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Total page count in the response (required)
        total_path: String,
        #[serde(default)]
        page_size_param: Option<String>,
        #[serde(default)]
        page_size: Option<u64>,
    },
}

/// Strategy-specific position between page fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    None,
    Offset(u64),
    Page(u64),
}

impl PaginationStrategy {
    /// Offset/limit paging with the conventional `offset` / `limit` parameter names
    pub fn offset(limit: u64, total_path: impl Into<String>) -> Self {
        Self::OffsetLimit {
            limit,
            initial_offset: 0,
            total_path: Some(total_path.into()),
            offset_param: default_offset_param(),
            limit_param: default_limit_param(),
        }
    }

    pub fn page_number(
        base_page: u64,
        page_param: impl Into<String>,
        total_path: impl Into<String>,
    ) -> Self {
        Self::PageNumber {
            base_page,
            page_param: page_param.into(),
            total_path: total_path.into(),
            page_size_param: None,
            page_size: None,
        }
    }

    /// Short name for logs and tables
    pub fn label(&self) -> &'static str {
        match self {
            Self::SinglePage => "single_page",
            Self::OffsetLimit { .. } => "offset_limit",
            Self::PageNumber { .. } => "page_number",
        }
    }

    /// Reject configurations that could never terminate
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::OffsetLimit { limit: 0, .. } => Err("offset paginator limit must be > 0".into()),
            Self::PageNumber {
                page_size_param: Some(_),
                page_size: None,
                ..
            } => Err("page_size_param set without page_size".into()),
            _ => Ok(()),
        }
    }

    pub fn initial_cursor(&self) -> Cursor {
        match self {
            Self::SinglePage => Cursor::None,
            Self::OffsetLimit { initial_offset, .. } => Cursor::Offset(*initial_offset),
            Self::PageNumber { base_page, .. } => Cursor::Page(*base_page),
        }
    }

    /// Query parameters carrying the cursor
    pub fn build_request(&self, cursor: Cursor) -> Vec<(String, String)> {
        match (self, cursor) {
            (
                Self::OffsetLimit {
                    limit,
                    offset_param,
                    limit_param,
                    ..
                },
                Cursor::Offset(offset),
            ) => vec![
                (offset_param.clone(), offset.to_string()),
                (limit_param.clone(), limit.to_string()),
            ],
            (
                Self::PageNumber {
                    page_param,
                    page_size_param,
                    page_size,
                    ..
                },
                Cursor::Page(page),
            ) => {
                let mut params = vec![(page_param.clone(), page.to_string())];
                if let (Some(name), Some(size)) = (page_size_param, page_size) {
                    params.push((name.clone(), size.to_string()));
                }
                params
            }
            _ => Vec::new(),
        }
    }

    /// Termination test. Returns the next cursor, or `None` after the last page.
    ///
    /// A page with zero records always terminates. A non-empty page whose
    /// total is already satisfied is still emitted by the caller; only the
    /// following fetch is skipped.
    pub fn advance(
        &self,
        resource: &str,
        cursor: Cursor,
        body: &Value,
        page_len: usize,
    ) -> Result<Option<Cursor>, PipelineError> {
        match (self, cursor) {
            (Self::SinglePage, _) => Ok(None),
            (
                Self::OffsetLimit {
                    limit, total_path, ..
                },
                Cursor::Offset(offset),
            ) => {
                if page_len == 0 {
                    return Ok(None);
                }
                let next = offset
                    .checked_add(*limit)
                    .ok_or_else(|| PipelineError::pagination(resource, "offset overflows u64"))?;
                match total_path {
                    Some(path) => {
                        let total = read_total(resource, body, path)?;
                        Ok((next < total).then_some(Cursor::Offset(next)))
                    }
                    None => Ok(((page_len as u64) >= *limit).then_some(Cursor::Offset(next))),
                }
            }
            (
                Self::PageNumber {
                    base_page,
                    total_path,
                    ..
                },
                Cursor::Page(page),
            ) => {
                if page_len == 0 {
                    return Ok(None);
                }
                let total_pages = read_total(resource, body, total_path)?;
                let fetched = page.saturating_sub(*base_page).saturating_add(1);
                if fetched >= total_pages {
                    return Ok(None);
                }
                let next = page
                    .checked_add(1)
                    .ok_or_else(|| PipelineError::pagination(resource, "page number overflows u64"))?;
                Ok(Some(Cursor::Page(next)))
            }
            (strategy, cursor) => Err(PipelineError::pagination(
                resource,
                format!("cursor {cursor:?} does not belong to {}", strategy.label()),
            )),
        }
    }
}

fn read_total(resource: &str, body: &Value, path: &str) -> Result<u64, PipelineError> {
    match json_path::select_u64(body, path) {
        Numeric::Value(total) => Ok(total),
        Numeric::Missing => Err(PipelineError::pagination(
            resource,
            format!("total path `{path}` not found in response"),
        )),
        Numeric::Invalid(raw) => Err(PipelineError::pagination(
            resource,
            format!("total at `{path}` is not numeric: {raw}"),
        )),
    }
}

/// Records at the resource's data selector. `None` when the selector is
/// missing or null (treated as an empty, final page).
fn select_records(body: &Value, selector: &str) -> Option<Vec<Record>> {
    match json_path::select(body, selector)? {
        Value::Null => None,
        Value::Array(items) => Some(items.clone()),
        single => Some(vec![single.clone()]),
    }
}

/// Fetches pages of any [`ResourceSpec`] from one API base URL
pub struct Extractor {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    base_url: String,
    retry: RetryPolicy,
}

impl Extractor {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenManager>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            tokens,
            base_url: base_url.into(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Lazy, finite page sequence starting from the strategy's initial cursor
    pub fn fetch<'a>(&'a self, resource: &'a ResourceSpec) -> Pages<'a> {
        let (cursor, pending_error) = match resource.paginator.validate() {
            Ok(()) => (Some(resource.paginator.initial_cursor()), None),
            Err(msg) => (None, Some(PipelineError::pagination(&resource.name, msg))),
        };
        Pages {
            extractor: self,
            resource,
            cursor,
            pending_error,
            page_index: 0,
        }
    }

    fn fetch_page(&self, resource: &ResourceSpec, cursor: Cursor) -> Result<Value, PipelineError> {
        let url = join_url(&self.base_url, &resource.path);
        let query = merge_query(&resource.params, resource.paginator.build_request(cursor));

        let resp = retry_transient(&resource.name, &self.retry, || {
            match self.get_once(&resource.name, &url, &query) {
                Err(e) if e.is_unauthorized() => {
                    log::warn!("{}: token rejected, re-authenticating", resource.name);
                    self.tokens.invalidate();
                    self.get_once(&resource.name, &url, &query)
                }
                other => other,
            }
        })?;

        serde_json::from_str(&resp.body).map_err(|e| {
            PipelineError::pagination(&resource.name, format!("response is not JSON: {e}"))
        })
    }

    fn get_once(
        &self,
        resource: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse, PipelineError> {
        let token = self.tokens.get_token()?;
        let resp = self
            .transport
            .get(url, query, &token)
            .map_err(|e| PipelineError::extraction(resource, None, &e.0))?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(PipelineError::extraction(
                resource,
                Some(resp.status),
                &resp.body,
            ))
        }
    }
}

/// Static params ∪ cursor params; the cursor wins on collision
fn merge_query(
    params: &BTreeMap<String, String>,
    cursor_params: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged = params.clone();
    merged.extend(cursor_params);
    merged.into_iter().collect()
}

/// Page iterator returned by [`Extractor::fetch`].
///
/// Yields `Ok(records)` per page; after the final page or the first error
/// it returns `None`.
pub struct Pages<'a> {
    extractor: &'a Extractor,
    resource: &'a ResourceSpec,
    cursor: Option<Cursor>,
    pending_error: Option<PipelineError>,
    page_index: usize,
}

impl Iterator for Pages<'_> {
    type Item = Result<Vec<Record>, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            return Some(Err(e));
        }
        let cursor = self.cursor.take()?;
        let name = &self.resource.name;

        let body = match self.extractor.fetch_page(self.resource, cursor) {
            Ok(body) => body,
            Err(e) => return Some(Err(e)),
        };

        let Some(records) = select_records(&body, &self.resource.data_selector) else {
            log::debug!(
                "{name}: no `{}` in response, treating as empty",
                self.resource.data_selector
            );
            return None;
        };

        match self
            .resource
            .paginator
            .advance(name, cursor, &body, records.len())
        {
            Ok(next) => self.cursor = next,
            Err(e) => return Some(Err(e)),
        }

        self.page_index += 1;
        log::debug!(
            "{name}: page {} ({} records, cursor {cursor:?})",
            self.page_index,
            records.len()
        );
        Some(Ok(records))
    }
}
