//! Command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use credential_pool::CredentialPool;
use denue::areas::{read_catalog, resolve_areas, write_area_file};
use denue::tasks::parse_strata;
use denue::{CsvSink, Fetcher, Orchestrator, RunSummary, TaskPlan, get_activities};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use transport::HttpTransport;

use crate::cli::{ExtractAreasArgs, RunArgs};
use crate::config::Config;
use crate::error::Error;

/// Resolve inputs, then quantify every task into the output CSV.
///
/// Every input is resolved before the first request except the activity
/// catalog, which itself needs the API.
pub async fn quantify(
    config: &Config,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let tokens: Vec<String> = config
        .resolve_tokens(args.tokens.as_deref())
        .map_err(Error::from)?
        .iter()
        .map(|t| t.expose().clone())
        .collect();
    let pool = CredentialPool::new(tokens, config.pool.retirement_threshold).map_err(|e| match e {
        credential_pool::Error::NoCredentials => Error::NoCredentials,
        other => Error::Config(common::Error::Config(other.to_string())),
    })?;

    let areas = resolve_areas(&args.area).await.map_err(Error::Areas)?;
    if areas.is_empty() {
        return Err(Error::NoAreas.into());
    }
    let strata = parse_strata(&args.strata);

    let transport = HttpTransport::new(config.retry_policy(), config.max_idle_per_host())
        .context("failed to build HTTP client")?;
    let fetcher = Arc::new(Fetcher::new(
        Arc::new(config.client_config()),
        Arc::clone(&pool),
        Arc::new(transport),
    ));

    let activities = tokio::select! {
        activities = get_activities(&fetcher, &args.activities) => activities,
        _ = cancel.cancelled() => anyhow::bail!("cancelled while resolving activities"),
    };
    if activities.is_empty() {
        return Err(Error::NoActivities.into());
    }

    info!(
        activities = activities.len(),
        areas = areas.len(),
        strata = ?strata,
        "inputs resolved"
    );

    let plan = TaskPlan::new(activities, areas, strata);
    let output = &config.run.output;
    let mut sink = CsvSink::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;

    let orchestrator = Orchestrator::new(fetcher, config.run.workers);
    let summary = orchestrator
        .run(&plan, &mut sink, cancel)
        .await
        .with_context(|| format!("failed writing {}", output.display()))?;
    pool.close();

    info!(path = %output.display(), rows = sink.rows(), "CSV written");
    for credential in summary.credentials.credentials.iter().filter(|c| c.retired) {
        warn!(credential = %credential.label, failures = credential.failures, "credential was retired");
    }
    Ok(summary)
}

/// Extract area codes from a catalog into a one-per-line file.
pub async fn extract_areas(args: &ExtractAreasArgs) -> Result<usize> {
    let codes = read_catalog(&args.input, &args.column)
        .await
        .with_context(|| format!("failed to read catalog {}", args.input.display()))?;
    write_area_file(&args.output, &codes).await?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        codes = codes.len(),
        "area codes extracted"
    );
    Ok(codes.len())
}
