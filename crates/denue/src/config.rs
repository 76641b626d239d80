//! Immutable client configuration
//!
//! Built once by the caller and shared by `Arc`, so independent runs (and
//! tests) never share mutable defaults.

use std::time::Duration;

use crate::tasks::FetchTask;

/// Production `Cuantificar` endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.inegi.org.mx/app/api/denue/v1/consulta/Cuantificar";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_WORKERS: usize = 50;

/// Every establishment-size stratum.
pub const ALL_STRATA: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub discovery_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Request URL: `{base}/{activity}/{area}/{stratum}/{token}`.
    pub fn endpoint(&self, task: &FetchTask, token: &str) -> String {
        format!("{}/{token}", self.task_prefix(task))
    }

    /// Endpoint with the token segment masked, for logs.
    pub fn redacted_endpoint(&self, task: &FetchTask) -> String {
        format!("{}/***", self.task_prefix(task))
    }

    fn task_prefix(&self, task: &FetchTask) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            task.activity,
            task.area,
            task.stratum
        )
    }
}
