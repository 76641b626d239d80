//! DENUE Cuantificar
//!
//! Batch client for the INEGI DENUE `Cuantificar` API:
//! 1. Resolves tokens, areas, strata and activities (optionally discovering
//!    the activity catalog)
//! 2. Queries every activity × area × stratum combination on a bounded pool
//!    of workers, rotating tokens and retiring rejected ones
//! 3. Streams one CSV row per combination as results arrive
//!
//! `extract-areas` builds the area file from the geostatistical catalog.

mod cli;
mod config;
mod error;
mod metrics;
mod run;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, RunArgs};
use crate::config::Config;
use crate::error::{EXIT_FAILURE, exit_code};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(ref args) => run_command(cli.config.as_deref(), args).await,
        Command::ExtractAreas(ref args) => run::extract_areas(args).await.map(|_| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Initialize tracing on stderr with LOG_LEVEL / RUST_LOG support.
/// LOG_FORMAT=json switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run_command(config_path: Option<&std::path::Path>, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let (mut config, loaded_from) = Config::discover(config_path).map_err(error::Error::from)?;
    config
        .apply_overrides(args.workers, args.output.clone(), args.metrics_file.clone())
        .map_err(error::Error::from)?;
    match loaded_from {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no config file, using defaults"),
    }

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = match metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let span = info_span!("run", run_id = %uuid::Uuid::new_v4());
    let summary = run::quantify(&config, args, cancel).instrument(span).await?;
    metrics::record_summary(&summary);

    if let (Some(handle), Some(path)) = (&prometheus, &config.run.metrics_file) {
        match metrics::write_snapshot(handle, path) {
            Ok(()) => info!(path = %path.display(), "metrics snapshot written"),
            Err(e) => warn!(error = %e, "failed to write metrics snapshot"),
        }
    }

    info!(
        total = summary.total,
        completed = summary.completed,
        failed = summary.failed,
        credentials_active = summary.credentials.active,
        credentials_retired = summary.credentials.retired,
        cancelled = summary.cancelled,
        "run summary"
    );

    if summary.cancelled {
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, stopping"),
        _ = terminate => info!("received SIGTERM, stopping"),
    }
    token.cancel();
}
