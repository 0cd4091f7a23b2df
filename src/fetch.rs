//! Async HTTP transport wrapping reqwest.
//!
//! This is the transport collaborator: timeouts, redirect limits, retry
//! on 5xx, and exponential backoff on 429 all live here. The pipeline
//! above it never retries and only ever consumes body text.

use crate::types::{UpstreamError, UpstreamResult};
use std::time::Duration;
use tracing::debug;

/// HTTP client shared by the shelf fetcher and the catalog scraper.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpClient {
    /// Create a client with the project user-agent and a redirect limit.
    ///
    /// The catalog front end redirect-loops on requests without a
    /// user-agent, so one is always sent.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = concat!("shelfcheck/", env!("CARGO_PKG_VERSION"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        Self { client, timeout_ms }
    }

    /// GET a document, with retry on 5xx and backoff on 429. Returns
    /// the body text.
    pub async fn get(&self, url: &str) -> UpstreamResult<String> {
        self.get_inner(url, None).await
    }

    /// GET with a fixed session cookie attached.
    ///
    /// Used for the catalog, whose search flow rejects cookieless
    /// requests with a redirect loop. The cookie value is shared,
    /// read-only state for the whole run.
    pub async fn get_with_cookie(
        &self,
        url: &str,
        cookie: Option<&str>,
    ) -> UpstreamResult<String> {
        self.get_inner(url, cookie).await
    }

    async fn get_inner(&self, url: &str, cookie: Option<&str>) -> UpstreamResult<String> {
        let mut retries = 0u32;
        let max_retries = 2;

        loop {
            let mut builder = self
                .client
                .get(url)
                .timeout(Duration::from_millis(self.timeout_ms));
            if let Some(c) = cookie {
                builder = builder.header(reqwest::header::COOKIE, c);
            }

            let resp = builder.send().await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    // Retry on 5xx
                    if status >= 500 && retries < max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    // Backoff on 429
                    if status == 429 && retries < max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        let delay = Duration::from_secs(retry_after.min(10));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status >= 400 {
                        return Err(UpstreamError::Transport(format!(
                            "GET {url} returned HTTP {status}"
                        )));
                    }

                    if r.url().as_str() != url {
                        debug!(url, final_url = %r.url(), "request redirected");
                    }

                    return Ok(r.text().await.unwrap_or_default());
                }
                Err(e) => {
                    if retries < max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
