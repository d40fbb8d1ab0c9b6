//! Fixed-interval scheduling of reconciliation passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::domain::ports::VoteSummarizer;

/// Run a pass every `interval` until `shutdown` resolves.
///
/// The first pass starts immediately. A pass that overruns the interval
/// delays the next tick instead of triggering a burst. Failed passes are
/// logged and the loop continues. A pass in progress when `shutdown`
/// resolves runs to completion. Returns the number of passes started.
pub async fn run_periodically<S, F>(summarizer: &S, interval: Duration, shutdown: F) -> u64
where
    S: VoteSummarizer + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut passes = 0_u64;
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!(passes, "reconciliation schedule stopped");
                return passes;
            }
            _ = ticker.tick() => {
                passes += 1;
                match summarizer.summarize_all_votes().await {
                    Ok(report) => info!(
                        pass = passes,
                        reconciled = report.reconciled.len(),
                        deferred = report.deferred.len(),
                        "scheduled reconciliation pass succeeded"
                    ),
                    Err(err) => error!(
                        pass = passes,
                        failed = err.failures().len(),
                        error = %err,
                        "scheduled reconciliation pass failed"
                    ),
                }
            }
        }
    }
}
