//! The aggregation pipeline: shelf in, per-book verdicts out.
//!
//! Shelf-level failures abort the whole run (a half-paginated shelf is
//! not returned as if complete). Catalog-level failures are scoped to
//! the one book or record they hit: the cause is recorded on that entry
//! and every sibling still completes. Callers always get one result per
//! shelf entry, in shelf order.

use crate::availability;
use crate::catalog;
use crate::config::Config;
use crate::fanout::run_bounded;
use crate::fetch::HttpClient;
use crate::shelf;
use crate::types::{AggregatedResult, Book, BookMatch, CatalogRecord, UpstreamResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Orchestrates one aggregation run against the two upstreams.
#[derive(Clone)]
pub struct Aggregator {
    client: HttpClient,
    config: Config,
    /// One global bound on simultaneous catalog requests. A permit is
    /// held around every search and detail-page GET, so the two fan-out
    /// levels together never exceed the configured cap.
    request_gate: Arc<Semaphore>,
}

impl Aggregator {
    pub fn new(config: Config) -> Self {
        let client = HttpClient::new(config.timeout_ms);
        let request_gate = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            client,
            config,
            request_gate,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch a user's shelf. Exposed separately for callers that only
    /// want the book list.
    pub async fn fetch_shelf(&self, user_id: &str) -> UpstreamResult<Vec<Book>> {
        shelf::fetch_shelf(&self.client, &self.config, user_id).await
    }

    /// Full pipeline: shelf pages sequentially, then per-book catalog
    /// lookups fanned out under the concurrency cap.
    pub async fn aggregate(&self, user_id: &str) -> UpstreamResult<Vec<AggregatedResult>> {
        let books = self.fetch_shelf(user_id).await?;
        info!(user_id, books = books.len(), "resolving availability");

        let ops = books.into_iter().map(|book| self.resolve_for_book(book));
        let results = run_bounded(ops, self.config.concurrency).await;

        let available = results
            .iter()
            .filter(|r| r.matches.iter().any(|m| m.verdict.is_available))
            .count();
        info!(user_id, available, total = results.len(), "aggregation done");
        Ok(results)
    }

    /// Resolve catalog matches and their holdings for one book.
    ///
    /// Never fails: a search failure comes back as an entry with empty
    /// matches and a recorded cause.
    pub async fn resolve_for_book(&self, book: Book) -> AggregatedResult {
        let searched = {
            let _permit = self.request_gate.acquire().await.ok();
            catalog::search(&self.client, &self.config, &book).await
        };

        let records = match searched {
            Ok(records) => records,
            Err(e) => {
                warn!(title = %book.title, error = %e, "catalog search failed");
                return AggregatedResult {
                    book,
                    matches: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let ops = records.into_iter().map(|record| self.resolve_record(record));
        let matches = run_bounded(ops, self.config.concurrency).await;

        AggregatedResult {
            book,
            matches,
            error: None,
        }
    }

    /// Scrape one record's holdings and build the augmented match.
    ///
    /// Pure transform of the record; a detail-page failure yields a
    /// match with no copies and a recorded cause, distinguishable from
    /// a genuinely empty holdings table by the error field.
    async fn resolve_record(&self, record: CatalogRecord) -> BookMatch {
        // A record the search page gave no id for has no detail page to
        // fetch; report that instead of issuing a doomed request.
        if record.record_url.is_empty() {
            debug!(title = %record.title, "record has no detail page, skipping holdings fetch");
            return BookMatch {
                record,
                copies: Vec::new(),
                verdict: availability::reduce_verdict(&[]),
                error: Some("no detail page for this record".to_string()),
            };
        }

        let fetched = {
            let _permit = self.request_gate.acquire().await.ok();
            availability::resolve_availability(&self.client, &self.config, &record).await
        };

        match fetched {
            Ok(copies) => {
                let verdict = availability::reduce_verdict(&copies);
                BookMatch {
                    record,
                    copies,
                    verdict,
                    error: None,
                }
            }
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "holdings fetch failed");
                BookMatch {
                    record,
                    copies: Vec::new(),
                    verdict: availability::reduce_verdict(&[]),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
