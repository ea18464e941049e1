// OLS API Client
//
// Paginated retrieval of EFO terms with retry/backoff, plus a
// bounded-concurrency resolver for the parents sub-resource.

use std::collections::{HashMap, VecDeque};

use efo_common::Result;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::OlsConfig;
use crate::ols::extract::{ParentsPage, RawTerm, TermsPage};

/// Outcome of fetching one page of the terms listing
///
/// Distinguishes "exhausted all retries" from "client error"; callers treat
/// both as end-of-sequence but log them differently, and neither is raised
/// as a fault since run bookkeeping must still finalize.
#[derive(Debug)]
pub enum PageOutcome {
    /// Parsed page payload
    Page(TermsPage),
    /// Transient failures exhausted the retry budget
    Unavailable,
    /// Non-retryable client error (4xx other than 429)
    ClientError(StatusCode),
}

/// HTTP client for the OLS API
pub struct OlsClient {
    client: Client,
    config: OlsConfig,
}

impl OlsClient {
    /// Create a new client with the given configuration
    pub fn new(config: OlsConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("EFO-Pipeline/1.0")
            .build()?;

        Ok(OlsClient { client, config })
    }

    /// Fetch a single page of the EFO terms listing
    ///
    /// Retry policy:
    /// - network errors and 5xx: exponential backoff, doubling each attempt
    /// - 429: waits twice the current backoff without advancing the multiplier
    /// - other 4xx: fatal for this page, returned immediately
    ///
    /// The courtesy delay is applied after a successful fetch only.
    pub async fn fetch_terms_page(&self, page_number: u32) -> PageOutcome {
        let url = self.config.terms_url();
        let mut backoff = self.config.retry_base;

        for attempt in 1..=self.config.max_retries {
            debug!(
                page = page_number,
                attempt,
                max = self.config.max_retries,
                "Fetching terms page"
            );

            match self
                .client
                .get(&url)
                .query(&[("page", page_number)])
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<TermsPage>().await {
                            Ok(page) => {
                                if !self.config.request_delay.is_zero() {
                                    sleep(self.config.request_delay).await;
                                }
                                return PageOutcome::Page(page);
                            }
                            Err(e) => {
                                warn!(page = page_number, error = %e, "Failed to parse page payload");
                            }
                        }
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(page = page_number, "Rate limited, waiting longer...");
                        sleep(backoff * 2).await;
                        // 429 does not advance the 5xx backoff multiplier
                        continue;
                    } else if status.is_server_error() {
                        warn!(page = page_number, status = %status, "Server error");
                    } else {
                        error!(page = page_number, status = %status, "Client error, giving up on page");
                        return PageOutcome::ClientError(status);
                    }
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "Request failed");
                }
            }

            if attempt < self.config.max_retries {
                sleep(backoff).await;
            }
            backoff *= 2;
        }

        error!(
            page = page_number,
            attempts = self.config.max_retries,
            "Failed to fetch page after all attempts"
        );
        PageOutcome::Unavailable
    }

    /// Lazily fetch all EFO terms, page by page
    ///
    /// The stream terminates when the source reports the last page, when an
    /// empty page arrives, when `limit` records have been yielded, or when a
    /// page becomes unavailable (retry exhaustion or client error — both end
    /// the sequence early with a prominent log line, not a fault).
    ///
    /// Not restartable mid-stream: resuming means starting again at page 0.
    pub fn fetch_all_terms(&self, limit: Option<usize>) -> impl Stream<Item = RawTerm> + '_ {
        info!(limit = ?limit, "Starting term retrieval");

        let state = PaginationState {
            page_number: 0,
            buffered: VecDeque::new(),
            yielded: 0,
            exhausted: false,
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(limit) = limit {
                    if state.yielded >= limit {
                        info!(limit, "Reached record limit");
                        return None;
                    }
                }

                if let Some(term) = state.buffered.pop_front() {
                    state.yielded += 1;
                    return Some((term, state));
                }

                if state.exhausted {
                    info!(fetched = state.yielded, "Term retrieval complete");
                    return None;
                }

                match self.fetch_terms_page(state.page_number).await {
                    PageOutcome::Page(page) => {
                        let last = page.is_last_page();
                        let terms = page.into_terms();

                        if terms.is_empty() {
                            info!(page = state.page_number, "No more terms found");
                            state.exhausted = true;
                            continue;
                        }

                        if state.page_number % 10 == 0 {
                            info!(
                                fetched = state.yielded,
                                page = state.page_number,
                                "Retrieval progress"
                            );
                        }

                        state.buffered.extend(terms);

                        if last {
                            debug!(page = state.page_number, "Reached last page");
                            state.exhausted = true;
                        } else {
                            state.page_number += 1;
                        }
                    }
                    PageOutcome::Unavailable => {
                        error!(
                            page = state.page_number,
                            "Page unavailable, stopping retrieval early"
                        );
                        state.exhausted = true;
                    }
                    PageOutcome::ClientError(status) => {
                        error!(
                            page = state.page_number,
                            status = %status,
                            "Client error, dataset truncated at this page"
                        );
                        state.exhausted = true;
                    }
                }
            }
        })
    }

    /// Resolve parent IRIs for a collection of parents-link URLs
    ///
    /// URLs are processed in fixed-size groups with bounded concurrency
    /// inside each group and a short pause between groups. Per-URL failures
    /// never abort the batch: every input URL appears in the returned map,
    /// with an empty list standing in for both "no parents" and "failed".
    pub async fn resolve_parents(&self, urls: &[String]) -> HashMap<String, Vec<String>> {
        info!(urls = urls.len(), "Batch fetching parent relationships");

        let mut results: HashMap<String, Vec<String>> = HashMap::with_capacity(urls.len());
        let mut failed = 0usize;

        let group_size = self.config.parent_concurrency;
        let total_groups = urls.len().div_ceil(group_size);

        for (group_idx, group) in urls.chunks(group_size).enumerate() {
            let fetched: Vec<(String, Option<Vec<String>>)> = stream::iter(group)
                .map(|url| async move { (url.clone(), self.fetch_parent_iris(url).await) })
                .buffer_unordered(group_size)
                .collect()
                .await;

            for (url, outcome) in fetched {
                match outcome {
                    Some(iris) => {
                        results.insert(url, iris);
                    }
                    None => {
                        failed += 1;
                        results.insert(url, Vec::new());
                    }
                }
            }

            debug!(
                group = group_idx + 1,
                total = total_groups,
                "Parent resolution group complete"
            );

            if group_idx + 1 < total_groups && !self.config.request_delay.is_zero() {
                sleep(self.config.request_delay).await;
            }
        }

        if failed > 0 {
            warn!(
                failed,
                total = urls.len(),
                "Some parent URLs failed to resolve; their relationships will be incomplete"
            );
        }
        info!(
            resolved = urls.len() - failed,
            failed,
            "Parent resolution complete"
        );

        results
    }

    /// Fetch parent IRIs from one parents-link URL
    ///
    /// Returns `None` on terminal failure; `Some(vec![])` means the term
    /// genuinely has no parents (404 or an empty embedded list).
    async fn fetch_parent_iris(&self, url: &str) -> Option<Vec<String>> {
        let mut backoff = self.config.retry_base;

        for attempt in 1..=self.config.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<ParentsPage>().await {
                            Ok(page) => return Some(page.parent_iris()),
                            Err(e) => {
                                warn!(url, error = %e, "Failed to parse parents payload");
                                return None;
                            }
                        }
                    } else if status == StatusCode::NOT_FOUND {
                        debug!(url, "No parents found (404)");
                        return Some(Vec::new());
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(url, "Rate limited fetching parents, waiting longer...");
                        sleep(backoff * 2).await;
                        continue;
                    } else {
                        warn!(url, status = %status, attempt, "HTTP error fetching parents");
                    }
                }
                Err(e) => {
                    warn!(url, error = %e, attempt, "Parents request failed");
                }
            }

            if attempt < self.config.max_retries {
                sleep(backoff).await;
            }
            backoff *= 2;
        }

        warn!(url, "Failed to fetch parents after all attempts");
        None
    }

    /// Client configuration
    pub fn config(&self) -> &OlsConfig {
        &self.config
    }
}

/// Internal pagination cursor for `fetch_all_terms`
struct PaginationState {
    page_number: u32,
    buffered: VecDeque<RawTerm>,
    yielded: usize,
    exhausted: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = OlsConfig::default();
        assert!(OlsClient::new(config).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = OlsConfig::default();
        config.base_url = String::new();
        assert!(OlsClient::new(config).is_err());
    }

    // HTTP behavior (pagination, retries, truncation, parent resolution)
    // is covered by the wiremock integration tests in tests/ols_client_tests.rs.
}
