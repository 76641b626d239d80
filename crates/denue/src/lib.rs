//! DENUE establishment quantifier
//!
//! Counts economic establishments from the INEGI DENUE `Cuantificar` API,
//! broken down by activity code, area code and size stratum, and streams the
//! counts to a CSV sink.
//!
//! Flow:
//! 1. `tasks` resolves activities (explicit list or catalog discovery),
//!    areas and strata into a `TaskPlan` (their Cartesian product)
//! 2. `Orchestrator` runs every task through the `Fetcher` on a bounded
//!    number of concurrent workers
//! 3. The `Fetcher` borrows a token from the credential pool, issues one GET
//!    through the transport and sums the returned records
//! 4. Each result is appended to the `ResultSink` in completion order

pub mod areas;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod record;
pub mod sink;
pub mod tasks;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use fetcher::{FetchOptions, FetchResult, Fetcher};
pub use orchestrator::{Orchestrator, RunSummary};
pub use record::Record;
pub use sink::{CsvSink, ResultRow, ResultSink};
pub use tasks::{FetchTask, TaskPlan, get_activities};
