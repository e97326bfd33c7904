//! Archive download with exponential backoff on transport failures.
//!
//! # Architecture
//!
//! - [`ArchiveFetcher`]: core trait for downloading an archive's bytes
//! - [`HttpFetcher`]: plain HTTP GET via `reqwest`
//! - [`RetryFetch`]: decorator that retries [`HarvestError::Fetch`] failures
//!
//! # Retry Strategy
//!
//! Only fetch failures are retried; a GET is idempotent, while every other
//! failure kind is structural and would fail the same way again.
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::HarvestError;
use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Download the raw bytes behind a URL.
pub trait ArchiveFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HarvestError>;
}

/// HTTP GET fetcher; any non-2xx status is a fetch failure.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ArchiveFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url, e))?
            .error_for_status()
            .map_err(|e| HarvestError::fetch(url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HarvestError::fetch(url, e))?;

        debug!(
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Downloaded archive"
        );
        Ok(bytes.to_vec())
    }
}

/// Wraps an [`ArchiveFetcher`] with bounded exponential backoff.
pub struct RetryFetch<F> {
    inner: F,
    /// Retries after the first attempt; `0` disables retrying.
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<F: ArchiveFetcher> RetryFetch<F> {
    pub fn new(inner: F, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<F> fmt::Debug for RetryFetch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<F: ArchiveFetcher> ArchiveFetcher for RetryFetch<F> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub use stub::ScriptedFetcher;

#[cfg(test)]
mod stub {
    use super::ArchiveFetcher;
    use crate::error::HarvestError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bytes per URL and records every request.
    #[derive(Debug, Default)]
    pub struct ScriptedFetcher {
        responses: HashMap<String, Result<Vec<u8>, String>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), Ok(bytes));
            self
        }

        pub fn with_failure(mut self, url: &str, message: &str) -> Self {
            self.responses.insert(url.to_string(), Err(message.to_string()));
            self
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }
    }

    impl ArchiveFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Ok(bytes)) => Ok(bytes.clone()),
                Some(Err(message)) => Err(HarvestError::fetch(url, message)),
                None => Err(HarvestError::fetch(url, "status 404 Not Found")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fails with the given error `failures` times, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        retryable: bool,
    }

    impl ArchiveFetcher for Flaky {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.retryable {
                    Err(HarvestError::fetch(url, "connection reset"))
                } else {
                    Err(HarvestError::Extract("not a zip".into()))
                }
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_fetch_failures() {
        let inner = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
            retryable: true,
        };
        let fetcher = RetryFetch::new(inner, 3, Duration::from_millis(1));
        assert_eq!(fetcher.fetch("http://x/a.zip").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max() {
        let inner = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
            retryable: true,
        };
        let fetcher = RetryFetch::new(inner, 2, Duration::from_millis(1));
        let err = fetcher.fetch("http://x/a.zip").await.unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { .. }));
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_fetch_errors_are_not_retried() {
        let inner = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
            retryable: false,
        };
        let fetcher = RetryFetch::new(inner, 5, Duration::from_millis(1));
        let err = fetcher.fetch("http://x/a.zip").await.unwrap_err();
        assert!(matches!(err, HarvestError::Extract(_)));
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let inner = Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
            retryable: true,
        };
        let fetcher = RetryFetch::new(inner, 50, Duration::from_secs(1));
        let d = fetcher.backoff(40);
        assert!(d >= Duration::from_secs(30));
        assert!(d <= Duration::from_millis(30_250));
    }

    #[tokio::test]
    async fn test_http_fetcher_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x50, 0x4b]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::default();
        let ok = fetcher.fetch(&format!("{}/ok.zip", server.uri())).await.unwrap();
        assert_eq!(ok, vec![0x50, 0x4b]);

        let err = fetcher
            .fetch(&format!("{}/gone.zip", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { .. }));
    }
}
