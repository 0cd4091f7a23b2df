//! Holdings scraping and the availability verdict.
//!
//! A catalog detail page carries a holdings table with one row per
//! physical copy: location, call number, status. Only the literal
//! status phrase "CHECK SHELVES" means a copy is on the shelf;
//! everything else ("DUE 03-10-24", "3 HOLD", "DAMAGE CHECK",
//! "IN TRANSIT", ...) counts as out.

use crate::config::Config;
use crate::fetch::HttpClient;
use crate::types::{AvailabilityVerdict, CatalogRecord, Copy, UpstreamResult};
use scraper::{Html, Selector};
use tracing::debug;

/// Status phrase marking a copy as shelf-available, matched
/// case-insensitively anywhere in the status text.
const AVAILABLE_PHRASE: &str = "CHECK SHELVES";

/// Fetch a record's detail page and parse its holdings table.
///
/// Returns an empty list both when the page has no holdings table and
/// when the table has no data rows; callers treat both as "no data".
pub async fn resolve_availability(
    client: &HttpClient,
    config: &Config,
    record: &CatalogRecord,
) -> UpstreamResult<Vec<Copy>> {
    debug!(record_id = %record.record_id, url = %record.record_url, "fetching holdings");
    let body = client
        .get_with_cookie(&record.record_url, config.catalog_session_cookie.as_deref())
        .await?;
    let copies = parse_holdings(&body);
    debug!(record_id = %record.record_id, copies = copies.len(), "parsed holdings");
    Ok(copies)
}

/// Parse the holdings table out of a detail page.
///
/// The first row is the header and is discarded. A data row with fewer
/// than three cells is malformed and dropped; its siblings are kept.
pub fn parse_holdings(html: &str) -> Vec<Copy> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse(".itemTable").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let Some(table) = document.select(&table_sel).next() else {
        return Vec::new();
    };

    let mut copies = Vec::new();
    for row in table.select(&row_sel).skip(1) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|c| c.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .collect();
        if cells.len() < 3 {
            debug!("holdings row has fewer than 3 columns, dropping");
            continue;
        }
        copies.push(Copy {
            location: cells[0].clone(),
            call_number: cells[1].clone(),
            status: cells[2].clone(),
        });
    }
    copies
}

/// Reduce a copy list to a verdict. Computed fresh every time.
pub fn reduce_verdict(copies: &[Copy]) -> AvailabilityVerdict {
    let available_count = copies
        .iter()
        .filter(|c| c.status.to_ascii_uppercase().contains(AVAILABLE_PHRASE))
        .count();
    AvailabilityVerdict {
        available_count,
        total_count: copies.len(),
        is_available: available_count > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(status: &str) -> Copy {
        Copy {
            location: "Main".to_string(),
            call_number: "813.54".to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_verdict_counts_check_shelves_case_insensitively() {
        let copies = vec![copy("CHECK SHELVES"), copy("DUE 01-01-25"), copy("check shelves")];
        let v = reduce_verdict(&copies);
        assert_eq!(v.available_count, 2);
        assert_eq!(v.total_count, 3);
        assert!(v.is_available);
    }

    #[test]
    fn test_verdict_holds_are_unavailable() {
        let v = reduce_verdict(&[copy("3 HOLD")]);
        assert_eq!(v.available_count, 0);
        assert_eq!(v.total_count, 1);
        assert!(!v.is_available);
    }

    #[test]
    fn test_verdict_unrecognized_status_counts_toward_total() {
        let copies = vec![copy("IN TRANSIT"), copy("DAMAGE CHECK"), copy("???")];
        let v = reduce_verdict(&copies);
        assert_eq!(v.available_count, 0);
        assert_eq!(v.total_count, 3);
    }

    #[test]
    fn test_verdict_empty_list() {
        let v = reduce_verdict(&[]);
        assert_eq!(v.total_count, 0);
        assert!(!v.is_available);
    }

    const HOLDINGS_PAGE: &str = r#"
    <html><body>
      <table class="itemTable">
        <tr><th>Location</th><th>Call No.</th><th>Status</th></tr>
        <tr><td>Main Library</td><td>SF LEG</td><td>CHECK SHELVES</td></tr>
        <tr><td>McCormick Branch</td><td>SF LEG</td><td>DUE 03-10-24</td></tr>
      </table>
    </body></html>
    "#;

    #[test]
    fn test_parse_holdings_skips_header() {
        let copies = parse_holdings(HOLDINGS_PAGE);
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].location, "Main Library");
        assert_eq!(copies[0].call_number, "SF LEG");
        assert_eq!(copies[0].status, "CHECK SHELVES");
        assert_eq!(copies[1].status, "DUE 03-10-24");
    }

    #[test]
    fn test_parse_holdings_drops_short_rows_keeps_siblings() {
        let html = r#"
        <table class="itemTable">
          <tr><th>Location</th><th>Call No.</th><th>Status</th></tr>
          <tr><td>Main</td><td>813.54</td><td>CHECK SHELVES</td></tr>
          <tr><td>Broken row</td></tr>
          <tr><td>East Branch</td><td>813.54</td><td>2 HOLD</td></tr>
        </table>
        "#;
        let copies = parse_holdings(html);
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].location, "Main");
        assert_eq!(copies[1].location, "East Branch");
    }

    #[test]
    fn test_parse_holdings_no_table() {
        let copies = parse_holdings("<html><body><p>Record not found</p></body></html>");
        assert!(copies.is_empty());
    }

    #[test]
    fn test_parse_holdings_table_with_only_header() {
        let html = r#"<table class="itemTable"><tr><th>L</th><th>C</th><th>S</th></tr></table>"#;
        assert!(parse_holdings(html).is_empty());
    }
}
