//! Page window arithmetic shared by list endpoints and the envelope stage.

use crate::error::AppError;
use std::collections::HashMap;

pub const DEFAULT_OFFSET: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 1000;
/// Largest offset a database `OFFSET` accepts.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// `(offset, limit)` of one list request. `limit` is always in `1..=MAX_LIMIT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    offset: u64,
    limit: u64,
}

impl Default for PageWindow {
    fn default() -> Self {
        PageWindow {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageWindow {
    pub fn new(offset: u64, limit: u64) -> Result<Self, AppError> {
        if offset > MAX_OFFSET {
            return Err(AppError::Validation(format!(
                "offset must be between 0 and {}",
                MAX_OFFSET
            )));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(PageWindow { offset, limit })
    }

    /// Window from `offset` / `limit` query parameters; absent parameters take the defaults.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let offset = parse_param(params, "offset")?.unwrap_or(DEFAULT_OFFSET);
        let limit = parse_param(params, "limit")?.unwrap_or(DEFAULT_LIMIT);
        Self::new(offset, limit)
    }

    /// Like `from_query` but never fails: anything unusable falls back to the default.
    pub fn from_query_lenient(params: &HashMap<String, String>) -> Self {
        let offset = params
            .get("offset")
            .and_then(|v| v.parse().ok())
            .filter(|o| *o <= MAX_OFFSET)
            .unwrap_or(DEFAULT_OFFSET);
        let limit = params
            .get("limit")
            .and_then(|v| v.parse().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT);
        PageWindow { offset, limit }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// 1-based page the window starts on.
    pub fn page(&self) -> u64 {
        (self.offset / self.limit).saturating_add(1)
    }

    /// Number of pages needed for `total_count` rows at this limit.
    pub fn page_count(&self, total_count: u64) -> u64 {
        total_count / self.limit + u64::from(total_count % self.limit != 0)
    }
}

fn parse_param(params: &HashMap<String, String>, name: &str) -> Result<Option<u64>, AppError> {
    params
        .get(name)
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| AppError::Validation(format!("{} must be a non-negative integer", name)))
        })
        .transpose()
}
