//! Page parsing for paginated API responses
//!
//! Every list endpoint answers with
//! `{ "data": [...], "pagination": { "offset", "max", "size", "links": [{ "rel", "uri" }] } }`.
//! Records stay as untyped JSON; only the pagination keys are typed.

use reqwest::Url;
use serde::Deserialize;

use super::{FetcherError, FetcherResult};
use crate::Record;

/// Pagination metadata attached to a page
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Offset of this page
    #[serde(default)]
    pub offset: u64,
    /// Requested page size
    pub max: u64,
    /// Records actually returned
    pub size: u64,
    /// Navigation links
    #[serde(default)]
    pub links: Vec<Link>,
}

/// One navigation link
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Link {
    /// Relation, e.g. `next` or `prev`
    pub rel: String,
    /// Full request URI
    pub uri: String,
}

/// One page of records
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    /// Records, in upstream order
    #[serde(rename = "data")]
    pub records: Vec<Record>,
    /// Pagination metadata
    pub pagination: Pagination,
}

impl Page {
    /// Parse a response body
    ///
    /// # Errors
    /// [`FetcherError::ParseError`] if the body is not a page document
    pub fn parse(body: &[u8]) -> FetcherResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| FetcherError::ParseError(format!("invalid page body: {e}")))
    }

    /// Whether fewer records came back than were asked for
    pub fn is_last(&self) -> bool {
        self.pagination.max > self.pagination.size
    }

    /// The `next` link, if any
    pub fn next_link(&self) -> Option<&str> {
        self.pagination
            .links
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| link.uri.as_str())
    }
}

/// Value of the `offset` query parameter of `uri`, if present and numeric
pub fn link_offset(uri: &str) -> Option<u64> {
    let url = Url::parse(uri).ok()?;
    let offset = url
        .query_pairs()
        .find(|(key, _)| key == "offset")
        .and_then(|(_, value)| value.parse().ok());
    offset
}
