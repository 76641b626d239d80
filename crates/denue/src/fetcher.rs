//! Single-task fetch: validate, borrow, request, classify, parse

use std::sync::Arc;
use std::time::Duration;

use credential_pool::{CredentialPool, Outcome};
use tracing::{debug, error, warn};
use transport::Transport;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::record::{Parsed, Record, parse_records, sum_counts};
use crate::tasks::FetchTask;
use crate::validate::{validate_activity, validate_area, validate_stratum};

/// Per-call knobs. Count queries use the request timeout; discovery uses the
/// shorter discovery timeout and allows stratum 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub allow_zero_stratum: bool,
}

impl FetchOptions {
    pub fn request(config: &ClientConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            allow_zero_stratum: false,
        }
    }

    pub fn discovery(config: &ClientConfig) -> Self {
        Self {
            timeout: config.discovery_timeout,
            allow_zero_stratum: true,
        }
    }
}

/// Count for one task. A failed fetch still carries a count of zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub task: FetchTask,
    pub count: u64,
    pub success: bool,
    /// `Error::kind` of the failure, if any.
    pub failure: Option<&'static str>,
}

pub struct Fetcher {
    config: Arc<ClientConfig>,
    pool: Arc<CredentialPool>,
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(
        config: Arc<ClientConfig>,
        pool: Arc<CredentialPool>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            pool,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Fetch the raw records for a task, surfacing why it failed.
    ///
    /// The borrowed credential is always returned: as a success on any 2xx
    /// (even if the body does not parse), as unauthorized on 401/403, and
    /// unchanged on every other failure.
    pub async fn try_fetch(&self, task: &FetchTask, options: FetchOptions) -> Result<Vec<Record>> {
        validate_task(task, options.allow_zero_stratum)?;

        let lease = self.pool.borrow().await?;
        let url = self.config.endpoint(task, lease.token());
        let redacted = self.config.redacted_endpoint(task);
        debug!(credential = lease.label(), url = %redacted, "requesting");

        let response = match self.transport.get(&url, options.timeout).await {
            Ok(response) => response,
            Err(e) => {
                warn!(credential = lease.label(), url = %redacted, error = %e, "request failed");
                lease.release(Outcome::Transient);
                return Err(e.into());
            }
        };

        if !response.is_success() {
            let status = response.status;
            let outcome = Outcome::from_status(status);
            warn!(credential = lease.label(), url = %redacted, status, "HTTP error");
            lease.release(outcome);
            return Err(match outcome {
                Outcome::Unauthorized => Error::Unauthorized { status },
                _ => Error::Status { status },
            });
        }
        lease.release(Outcome::Success);

        match parse_records(&response.body) {
            Ok(Parsed::Records(records)) => Ok(records),
            Ok(Parsed::NotASequence(kind)) => {
                warn!(url = %redacted, kind, "response is not a list, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(url = %redacted, error = %e, "response is not valid JSON");
                Err(Error::MalformedResponse(e.to_string()))
            }
        }
    }

    /// Records for a count query, or empty on any failure.
    pub async fn fetch(&self, task: &FetchTask) -> Vec<Record> {
        self.fetch_with(task, FetchOptions::request(&self.config))
            .await
    }

    pub async fn fetch_with(&self, task: &FetchTask, options: FetchOptions) -> Vec<Record> {
        self.try_fetch(task, options).await.unwrap_or_default()
    }

    /// Establishment count for a task; zero when nothing could be fetched.
    pub async fn quantify(&self, task: &FetchTask) -> u64 {
        sum_counts(&self.fetch(task).await)
    }

    pub async fn quantify_task(&self, task: FetchTask) -> FetchResult {
        match self
            .try_fetch(&task, FetchOptions::request(&self.config))
            .await
        {
            Ok(records) => FetchResult {
                count: sum_counts(&records),
                task,
                success: true,
                failure: None,
            },
            Err(e) => FetchResult {
                task,
                count: 0,
                success: false,
                failure: Some(e.kind()),
            },
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn validate_task(task: &FetchTask, allow_zero_stratum: bool) -> Result<()> {
    let invalid = if !validate_activity(&task.activity) {
        Some(("activity", task.activity.clone()))
    } else if !validate_area(&task.area) {
        Some(("area", task.area.clone()))
    } else if !validate_stratum(task.stratum, allow_zero_stratum) {
        Some(("stratum", task.stratum.to_string()))
    } else {
        None
    };

    match invalid {
        Some((field, value)) => {
            error!(
                activity = %task.activity,
                area = %task.area,
                stratum = task.stratum,
                field,
                "invalid parameters, skipping request"
            );
            Err(Error::InvalidInput { field, value })
        }
        None => Ok(()),
    }
}
