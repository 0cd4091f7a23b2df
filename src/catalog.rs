//! Catalog search: normalized-title queries against the library's
//! public search pages.
//!
//! The catalog exposes no stable identifier shared with the shelf
//! service, so matching is by normalized title substring search, done
//! server-side. Result rows are parsed defensively: a row missing its
//! title or id yields empty-string fields rather than aborting the
//! batch.

use crate::config::Config;
use crate::fetch::HttpClient;
use crate::types::{Book, CatalogRecord, UpstreamError, UpstreamResult};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Canonicalize a title into a search-safe form.
///
/// Keeps ASCII letters, apostrophes, periods, and whitespace; lowercases
/// the rest away. Pure and idempotent.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '\'' || *c == '.' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Search the catalog for records matching a shelf book.
///
/// One request, all surviving rows returned. No ranking and no dedupe:
/// multiple matches mean "no single confident match" and interpreting
/// them is the caller's job. Fails only if the search request itself
/// fails; individual malformed rows never abort the batch.
pub async fn search(
    client: &HttpClient,
    config: &Config,
    book: &Book,
) -> UpstreamResult<Vec<CatalogRecord>> {
    let url = search_url(config, &book.title)?;
    debug!(title = %book.title, url = %url, "searching catalog");

    let body = client
        .get_with_cookie(url.as_str(), config.catalog_session_cookie.as_deref())
        .await?;

    let records = parse_search_results(&body, &config.catalog_base_url);
    let filtered = filter_book_records(records);
    debug!(title = %book.title, matches = filtered.len(), "catalog search done");
    Ok(filtered)
}

/// Keep only rows the catalog labels as physical books.
pub fn filter_book_records(records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    records.into_iter().filter(|r| r.media_type == "Book").collect()
}

fn search_url(config: &Config, title: &str) -> UpstreamResult<Url> {
    let normalized = normalize_title(title);
    // Url's parser percent-encodes the spaces in the path segment.
    Url::parse(&format!(
        "{}/search/C__St:({normalized})?lang=eng",
        config.catalog_base_url
    ))
    .map_err(|e| UpstreamError::Parse(format!("bad catalog search URL: {e}")))
}

/// Detail page URL for a record id, empty for an empty id.
pub fn record_url(catalog_base_url: &str, record_id: &str) -> String {
    if record_id.is_empty() {
        return String::new();
    }
    format!("{catalog_base_url}/record/C__R{record_id}?lang=eng")
}

/// Parse a search results page into raw records, one per result block.
pub fn parse_search_results(html: &str, catalog_base_url: &str) -> Vec<CatalogRecord> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".searchResult").unwrap();
    let title_sel = Selector::parse(".title").unwrap();
    let media_sel = Selector::parse(".itemMediaDescription").unwrap();

    let mut records = Vec::new();
    for element in document.select(&result_sel) {
        let title = element
            .select(&title_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let record_id = element
            .value()
            .attr("id")
            .map(|id| id.replace("resultRecord-", ""))
            .unwrap_or_default();
        let media_type = element
            .select(&media_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();

        records.push(CatalogRecord {
            title,
            record_url: record_url(catalog_base_url, &record_id),
            record_id,
            media_type,
        });
    }
    records
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}
