//! Pipeline configuration.
//!
//! Defaults match the live services; tests and the binary override the
//! base URLs and credentials through `Config` fields or environment
//! variables.

/// Environment variable holding the shelf service API key.
pub const ENV_API_KEY: &str = "SHELFCHECK_API_KEY";

/// Environment variable holding a fixed catalog session cookie.
pub const ENV_CATALOG_COOKIE: &str = "SHELFCHECK_CATALOG_COOKIE";

/// Configuration for one aggregation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the shelf service (the review-list endpoint lives at
    /// `<base>/review/list`).
    pub shelf_base_url: String,
    /// Base URL of the catalog's public search/detail interface.
    pub catalog_base_url: String,
    /// API key passed through to the shelf service. Read-only key.
    pub shelf_api_key: String,
    /// Fixed session cookie for the catalog, established out of band.
    /// Shared read-only across all requests in a run; if the catalog
    /// starts rejecting it the whole run fails, no in-band refresh.
    pub catalog_session_cookie: Option<String>,
    /// Shelf page size.
    pub per_page: u32,
    /// Ceiling on the number of shelf pages fetched.
    pub max_pages: u32,
    /// Cap on simultaneous catalog search/detail requests.
    pub concurrency: usize,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shelf_base_url: "https://www.goodreads.com".to_string(),
            catalog_base_url: "https://encore.kpl.org/iii/encore_wpl".to_string(),
            shelf_api_key: String::new(),
            catalog_session_cookie: None,
            per_page: 50,
            max_pages: 20,
            concurrency: 5,
            timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Defaults with credentials pulled from the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            cfg.shelf_api_key = key;
        }
        if let Ok(cookie) = std::env::var(ENV_CATALOG_COOKIE) {
            if !cookie.is_empty() {
                cfg.catalog_session_cookie = Some(cookie);
            }
        }
        cfg
    }
}
