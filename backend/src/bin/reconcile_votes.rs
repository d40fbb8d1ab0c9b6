//! Fold pending and retracted votes into the per-option result counters.
//!
//! Runs a single reconciliation pass by default. With an interval configured
//! (`--interval-secs` or `RECONCILER_INTERVAL_SECS`) it keeps reconciling
//! until interrupted.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use ortho_config::OrthoConfig;
use poll_ledger::job::{JobOutcome, ReconcileJob, ReconcileJobSettings};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `reconcile-votes` command arguments.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "reconcile-votes",
    about = "Reconcile the vote ledger into poll result counters",
    version
)]
struct CliArgs {
    /// Database connection URL. Overrides `RECONCILER_DATABASE_URL` and
    /// `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Seconds between passes; zero runs a single pass.
    #[arg(long = "interval-secs", value_name = "seconds")]
    interval_secs: Option<u64>,
}

impl CliArgs {
    fn apply(self, mut settings: ReconcileJobSettings) -> ReconcileJobSettings {
        if let Some(url) = self.database_url {
            settings.database_url = Some(url);
        }
        if let Some(secs) = self.interval_secs {
            settings.interval_secs = Some(secs);
        }
        settings
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let settings = ReconcileJobSettings::load_from_iter([OsString::from("reconcile-votes")])
        .wrap_err("failed to load reconciler configuration")?;
    let settings = args.apply(settings);

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build reconciler runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: ReconcileJobSettings) -> Result<()> {
    let job = ReconcileJob::connect(&settings)
        .await
        .wrap_err("failed to set up reconciliation job")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };

    match job.run(shutdown).await.wrap_err("reconciliation pass failed")? {
        JobOutcome::Completed(report) => info!(
            polls = report.reconciled.len(),
            deferred = report.deferred.len(),
            credited = report.credited(),
            debited = report.debited(),
            "reconciliation complete"
        ),
        JobOutcome::Stopped { passes } => info!(passes, "reconciliation schedule stopped"),
    }
    Ok(())
}
