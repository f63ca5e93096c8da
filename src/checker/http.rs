// src/checker/http.rs
// =============================================================================
// This module checks if image URLs are alive by making HTTP requests.
//
// Key functionality:
// - Makes HTTP HEAD requests (lightweight, no body download)
// - Only an exact 200 counts as alive; redirects are NOT followed
// - Every failure (404, timeout, DNS, refused, bad URL) becomes `false`
// - Runs many checks concurrently with a fixed upper bound
//
// Rust concepts:
// - async/await: For concurrent network I/O
// - Streams: For processing many items concurrently, in order
// =============================================================================

use futures::stream::{self, StreamExt}; // StreamExt gives us .buffered()
use reqwest::{Client, StatusCode};

use crate::config::ProbeConfig;
use crate::error::{LinkerError, Result};

/// Probes image URLs and reports a plain reachable / not reachable answer.
///
/// Cloning is cheap: the inner reqwest client is reference counted.
#[derive(Debug, Clone)]
pub struct StatusChecker {
    client: Client,
    max_workers: usize,
}

impl StatusChecker {
    /// Builds a checker whose requests give up after `config.timeout`.
    pub fn new(config: ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| LinkerError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(StatusChecker {
            client,
            max_workers: config.max_workers.max(1),
        })
    }

    /// Returns true iff a HEAD request to `url` answers exactly HTTP 200.
    ///
    /// Empty or missing URLs return false without touching the network.
    /// No error ever escapes; failures are logged at debug level.
    pub async fn check(&self, url: Option<&str>) -> bool {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return false,
        };

        match self.client.head(url).send().await {
            Ok(response) => {
                let alive = response.status() == StatusCode::OK;
                if !alive {
                    tracing::debug!(url, status = response.status().as_u16(), "image probe failed");
                }
                alive
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "image probe error");
                false
            }
        }
    }

    /// Checks every URL and returns one status per input, in input order.
    ///
    /// At most `max_workers` probes are in flight at once. `.buffered()`
    /// (unlike `.buffer_unordered()`) hands results back in the order the
    /// futures were created, so `scan(urls)[i]` always belongs to `urls[i]`.
    pub async fn scan(&self, urls: &[Option<String>]) -> Vec<bool> {
        let probes = urls.iter().map(|url| self.check(url.as_deref()));

        stream::iter(probes)
            .buffered(self.max_workers)
            .collect()
            .await
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why HEAD instead of GET?
//    - HEAD returns only the headers, never the image body
//    - We only need the status code, so this saves a lot of bandwidth
//
// 2. buffered vs buffer_unordered
//    - Both run up to N futures at the same time
//    - buffer_unordered yields whichever finishes first
//    - buffered waits and yields them in the original order
//    - We need the original order to line statuses up with records
//
// 3. Why does check() return bool and not Result?
//    - A broken image is the normal, expected answer for this tool
//    - Callers only ever want "show it as OK or as Error"
// -----------------------------------------------------------------------------
