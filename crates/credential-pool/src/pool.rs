//! Credential circulation and retirement
//!
//! The pool keeps one slot per supplied token (identity, failure count,
//! retired flag) and a FIFO of idle slot indices, both behind a single lock so
//! queue membership and failure bookkeeping can never disagree. A semaphore
//! holds exactly one permit per idle slot; `borrow()` waits on it.
//!
//! A retired slot never gets its permit back. When every token is retired,
//! `borrow()` waits forever unless the pool is closed.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use common::Secret;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::outcome::Outcome;

/// Authorization failures after which a token is retired.
pub const DEFAULT_RETIREMENT_THRESHOLD: u32 = 3;

struct Slot {
    label: String,
    token: Secret<String>,
    failures: u32,
    retired: bool,
}

struct State {
    slots: Vec<Slot>,
    idle: VecDeque<usize>,
    in_use: usize,
}

impl State {
    fn active(&self) -> usize {
        self.slots.iter().filter(|s| !s.retired).count()
    }
}

/// Per-token view for status reporting. Never includes the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub label: String,
    pub failures: u32,
    pub retired: bool,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub retired: usize,
    pub idle: usize,
    pub in_use: usize,
    pub credentials: Vec<CredentialStatus>,
}

/// Thread-safe rotating set of access tokens.
pub struct CredentialPool {
    state: Mutex<State>,
    available: Semaphore,
    threshold: u32,
}

impl CredentialPool {
    /// Create a pool from caller-supplied tokens.
    ///
    /// Blank entries are ignored and duplicates collapse into one slot. Tokens
    /// are labelled `cred-1`, `cred-2`, ... in input order for logging.
    pub fn new(tokens: Vec<String>, threshold: u32) -> Result<Arc<Self>> {
        if threshold == 0 {
            return Err(Error::InvalidThreshold);
        }

        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for token in tokens {
            let token = token.trim().to_owned();
            if token.is_empty() {
                continue;
            }
            if !seen.insert(token.clone()) {
                warn!(position = slots.len() + 1, "duplicate credential ignored");
                continue;
            }
            slots.push(Slot {
                label: format!("cred-{}", slots.len() + 1),
                token: Secret::new(token),
                failures: 0,
                retired: false,
            });
        }

        if slots.is_empty() {
            return Err(Error::NoCredentials);
        }

        let n = slots.len();
        info!(credentials = n, threshold, "credential pool initialized");
        metrics::gauge!("denue_credentials_active").set(n as f64);

        Ok(Arc::new(Self {
            state: Mutex::new(State {
                slots,
                idle: (0..n).collect(),
                in_use: 0,
            }),
            available: Semaphore::new(n),
            threshold,
        }))
    }

    /// Wait for an idle token and lease it.
    ///
    /// Returns `Error::Closed` only after `close()`. With every token retired
    /// and the pool open, this never resolves.
    pub async fn borrow(self: &Arc<Self>) -> Result<Lease> {
        let permit = self.available.acquire().await.map_err(|_| Error::Closed)?;
        permit.forget();

        let mut state = self.lock();
        // one permit per idle slot
        let index = state.idle.pop_front().ok_or(Error::Closed)?;
        state.in_use += 1;
        let slot = &state.slots[index];
        debug!(credential = %slot.label, "credential borrowed");

        Ok(Lease {
            pool: Arc::clone(self),
            index,
            label: slot.label.clone(),
            token: slot.token.clone(),
            released: false,
        })
    }

    /// Stop handing out tokens. Pending and future borrows fail with
    /// `Error::Closed`; outstanding leases may still be released.
    pub fn close(&self) {
        if !self.available.is_closed() {
            self.available.close();
            info!("credential pool closed");
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        let active = state.active();
        PoolStatus {
            total: state.slots.len(),
            active,
            retired: state.slots.len() - active,
            idle: state.idle.len(),
            in_use: state.in_use,
            credentials: state
                .slots
                .iter()
                .map(|s| CredentialStatus {
                    label: s.label.clone(),
                    failures: s.failures,
                    retired: s.retired,
                })
                .collect(),
        }
    }

    fn release_slot(&self, index: usize, outcome: Outcome) {
        let mut state = self.lock();
        state.in_use = state.in_use.saturating_sub(1);

        if outcome == Outcome::Unauthorized {
            let threshold = self.threshold;
            let slot = &mut state.slots[index];
            slot.failures += 1;
            let failures = slot.failures;
            let label = slot.label.clone();

            if failures >= threshold {
                slot.retired = true;
                let active = state.active();
                warn!(
                    credential = %label,
                    failures,
                    active,
                    "credential retired after repeated authorization failures"
                );
                metrics::counter!("denue_credentials_retired_total").increment(1);
                metrics::gauge!("denue_credentials_active").set(active as f64);
                if active == 0 {
                    error!("all credentials retired; pending requests will wait indefinitely");
                }
                return;
            }

            warn!(
                credential = %label,
                failures,
                threshold,
                "credential rejected by upstream"
            );
        }

        state.idle.push_back(index);
        self.available.add_permits(1);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("CredentialPool")
            .field("total", &status.total)
            .field("active", &status.active)
            .field("idle", &status.idle)
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// A borrowed token. Hand it back with `release`; dropping it unreleased
/// returns the token unchanged, so cancelled work never leaks credentials.
pub struct Lease {
    pool: Arc<CredentialPool>,
    index: usize,
    label: String,
    token: Secret<String>,
    released: bool,
}

impl Lease {
    /// Raw token for building the request.
    pub fn token(&self) -> &str {
        self.token.expose()
    }

    /// Log-safe name of the token.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn release(mut self, outcome: Outcome) {
        self.released = true;
        debug!(credential = %self.label, outcome = outcome.label(), "credential released");
        self.pool.release_slot(self.index, outcome);
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.released {
            debug!(credential = %self.label, "lease dropped unreleased, returning credential");
            self.pool.release_slot(self.index, Outcome::Transient);
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("label", &self.label)
            .field("token", &self.token)
            .finish()
    }
}
