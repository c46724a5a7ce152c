//! Targeting requests and pagination.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::error::{ReachError, Result};

/// A 1-based page of results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    /// Creates a page, checking `page >= 1` and `1 <= limit <= MAX_PAGE_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page == 0 {
            return Err(ReachError::Validation(format!(
                "invalid page parameter: {}",
                page
            )));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ReachError::Validation(format!(
                "invalid limit parameter: {}",
                limit
            )));
        }
        Ok(Self { page, limit })
    }

    /// 1-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of eligible campaigns skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Requested dimension values plus the page to return.
///
/// Dimensions are kept sorted by name; each name carries exactly one value,
/// trimmed and non-empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingRequest {
    dimensions: BTreeMap<String, String>,
    page: Page,
}

impl TargetingRequest {
    /// Creates an empty request for the given page.
    pub fn new(page: Page) -> Self {
        Self {
            dimensions: BTreeMap::new(),
            page,
        }
    }

    /// Adds a dimension value.
    ///
    /// Name and value are trimmed. Returns false (and changes nothing) when
    /// either is blank or the dimension is already present.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> bool {
        let name = name.as_ref().trim();
        let value = value.as_ref().trim();
        if name.is_empty() || value.is_empty() || self.dimensions.contains_key(name) {
            return false;
        }
        self.dimensions.insert(name.to_string(), value.to_string());
        true
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.insert(name, value);
        self
    }

    /// Requested value for a dimension.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }

    /// `(name, value)` pairs sorted by name.
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dimensions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Page to return.
    pub fn page(&self) -> Page {
        self.page
    }

    /// Number of requested dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns true if no dimension is requested.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}
