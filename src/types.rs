//! Core data model for the availability pipeline.
//!
//! All values here are request-scoped: built once during parsing, immutable
//! afterward, and dropped when the aggregation run ends.

use serde::{Deserialize, Serialize};

/// A book on the user's "to-read" shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Title as reported by the shelf service. May be empty if the
    /// source omitted it.
    pub title: String,
    /// ISBN-10, possibly empty.
    pub isbn: String,
    /// ISBN-13, possibly empty.
    pub isbn13: String,
    /// First listed author only, possibly empty.
    pub author: String,
    /// Link back to the book on the shelf service.
    pub source_url: String,
    /// Cover image URL. Never the shelf service's "nophoto" placeholder:
    /// the fetcher rewrites placeholders to an Open Library cover keyed
    /// by ISBN, or leaves this `None` when there is no ISBN to key on.
    pub cover_image_url: Option<String>,
}

/// One result row from a catalog search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub title: String,
    /// Stable catalog identifier, empty if the page provided none.
    pub record_id: String,
    /// Detail page URL, empty iff `record_id` is empty.
    pub record_url: String,
    /// Media type label from the result row (e.g. "Book", "DVD").
    pub media_type: String,
}

/// One row of a holdings table on a catalog detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Copy {
    pub location: String,
    pub call_number: String,
    /// Free-text status, e.g. "CHECK SHELVES", "DUE 03-10-24", "3 HOLD".
    pub status: String,
}

/// Summary derived from a holdings table. Computed fresh from a `Copy`
/// list, never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityVerdict {
    pub available_count: usize,
    pub total_count: usize,
    pub is_available: bool,
}

impl AvailabilityVerdict {
    /// One-line status in the catalog's own vocabulary, e.g.
    /// `"AVAILABLE: 2 of 3 copies available"`.
    pub fn summary(&self) -> String {
        let short = if self.is_available {
            "AVAILABLE"
        } else {
            "NOT AVAILABLE"
        };
        format!(
            "{short}: {} of {} copies available",
            self.available_count, self.total_count
        )
    }
}

/// A catalog record augmented with its scraped holdings.
///
/// Built as a pure transform of a `CatalogRecord` once its detail page
/// has been scraped; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMatch {
    pub record: CatalogRecord,
    pub copies: Vec<Copy>,
    pub verdict: AvailabilityVerdict,
    /// Recorded cause if the detail-page fetch failed. Copies are empty
    /// in that case; availability is unknown, not "unavailable".
    pub error: Option<String>,
}

/// Final per-book output: one per shelf entry, in shelf order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub book: Book,
    pub matches: Vec<BookMatch>,
    /// Recorded cause if the catalog search for this book failed
    /// entirely. `matches` is empty in that case.
    pub error: Option<String>,
}

/// Errors from the two upstream services.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// Network, timeout, or connection failure on a fetch.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response's root structure was unrecognizable.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Transport(e.to_string())
    }
}

/// Convenience result type.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
