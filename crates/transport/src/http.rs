//! reqwest-backed transport with connection pooling and retries

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, instrument, warn};

use crate::error::{Result, TransportError};
use crate::retry::RetryPolicy;
use crate::{Response, Transport};

/// Pooled HTTP client that retries GETs per its `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Build a client keeping up to `max_idle_per_host` idle connections, so
    /// that every worker can reuse a connection to the API host.
    pub fn new(policy: RetryPolicy, max_idle_per_host: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(max_idle_per_host)
            .user_agent(concat!("denue-cuantificar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Build(e.without_url().to_string()))?;
        Ok(Self { client, policy })
    }

    #[instrument(skip_all)]
    async fn get_with_retry(&self, url: &str, timeout: Duration) -> Result<Response> {
        let mut retries = 0u32;

        loop {
            let retry_after = match self.send_once(url, timeout).await {
                Ok((response, retry_after)) => {
                    if !self.policy.retries_status(response.status)
                        || retries >= self.policy.max_retries
                    {
                        metrics::counter!(
                            "denue_transport_requests_total",
                            "status" => response.status.to_string()
                        )
                        .increment(1);
                        return Ok(response);
                    }
                    warn!(
                        status = response.status,
                        attempt = retries + 1,
                        "retryable status from upstream"
                    );
                    retry_after
                }
                Err(e) => {
                    if !is_retryable(&e) || retries >= self.policy.max_retries {
                        metrics::counter!(
                            "denue_transport_requests_total",
                            "status" => "network_error"
                        )
                        .increment(1);
                        return Err(TransportError::from_reqwest(e, retries + 1));
                    }
                    warn!(
                        error = %e.without_url(),
                        attempt = retries + 1,
                        "network failure talking to upstream"
                    );
                    None
                }
            };

            retries += 1;
            let delay = self.policy.delay_for(retries, retry_after);
            metrics::counter!("denue_transport_retries_total").increment(1);
            debug!(
                retry = retries,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: send, then read the whole body so the connection returns
    /// to the pool.
    async fn send_once(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<(Response, Option<Duration>), reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;
        Ok((Response { status, body }, retry_after))
    }
}

impl Transport for HttpTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        Box::pin(self.get_with_retry(url, timeout))
    }
}

/// Connection-level failures worth another attempt.
fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_body() || error.is_request()
}

/// Seconds form of `Retry-After`. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
