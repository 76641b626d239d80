//! Scripted transports and sinks shared by unit tests

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credential_pool::{CredentialPool, DEFAULT_RETIREMENT_THRESHOLD};
use transport::{Response, Transport};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::sink::{ResultRow, ResultSink};

type Handler = dyn Fn(&str) -> transport::Result<Response> + Send + Sync;
type Delay = dyn Fn(&str) -> Option<Duration> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub url: String,
    pub timeout: Duration,
}

/// Transport answering every GET from a closure, optionally after a delay
/// (`None` means never answer).
pub struct FnTransport {
    handler: Box<Handler>,
    delay: Box<Delay>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FnTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str) -> transport::Result<Response> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Box::new(|_| Some(Duration::ZERO)),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay<D>(mut self, delay: D) -> Self
    where
        D: Fn(&str) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Most requests that were ever pending at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Transport for FnTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = transport::Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call {
                url: url.to_string(),
                timeout,
            });
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _in_flight = InFlight(&self.in_flight);
            match (self.delay)(url) {
                Some(delay) if !delay.is_zero() => tokio::time::sleep(delay).await,
                Some(_) => {}
                None => std::future::pending::<()>().await,
            }
            (self.handler)(url)
        })
    }
}

/// 200 response with the given body.
pub fn ok(body: &str) -> transport::Result<Response> {
    Ok(Response {
        status: 200,
        body: body.to_string(),
    })
}

/// Trailing `[activity, area, stratum, token]` segments of a request URL.
pub fn segments(url: &str) -> Vec<&str> {
    url.rsplit('/').take(4).collect::<Vec<_>>().into_iter().rev().collect()
}

pub fn fetcher_with(tokens: &[&str], transport: FnTransport) -> (Fetcher, Arc<FnTransport>) {
    let transport = Arc::new(transport);
    let pool = CredentialPool::new(
        tokens.iter().map(|t| t.to_string()).collect(),
        DEFAULT_RETIREMENT_THRESHOLD,
    )
    .unwrap();
    let fetcher = Fetcher::new(
        Arc::new(ClientConfig::with_base_url("http://denue.test/api")),
        pool,
        transport.clone(),
    );
    (fetcher, transport)
}

/// Sink collecting rows in memory, optionally failing after `fail_after` rows.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<ResultRow>,
    pub flushes: usize,
    pub fail_after: Option<usize>,
}

impl ResultSink for MemorySink {
    fn write_row<'a>(
        &'a mut self,
        row: &'a ResultRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_after.is_some_and(|n| self.rows.len() >= n) {
                return Err(crate::Error::Sink(std::io::Error::other("disk full")));
            }
            self.rows.push(row.clone());
            Ok(())
        })
    }

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.flushes += 1;
            Ok(())
        })
    }
}
