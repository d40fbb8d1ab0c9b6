//! Reconciliation job draining the vote ledger into the result store.
//!
//! One pass lists polls with votes awaiting credit or debit and runs the
//! per-poll unit for each through a bounded fan-out. Units for different
//! polls run in parallel and fail independently. The run deadline bounds the
//! whole pass: discovery and every unit race it, and a unit still running
//! when it elapses is dropped and reported as deferred.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt as _;
use futures_util::stream;
use mockable::Clock;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::domain::PollId;
use crate::domain::ports::{PollResultRepository, VoteSummarizer};

mod report;
mod schedule;

pub use report::{PollFailure, PollReconciliation, ReconciliationError, ReconciliationReport};
pub use schedule::run_periodically;

/// Fan-out and deadline bounds for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReconcilerConfig {
    /// Polls reconciled concurrently.
    pub max_concurrent_polls: usize,
    /// Bound on the whole pass, discovery included.
    pub run_deadline: Duration,
}

impl Default for VoteReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_polls: 8,
            run_deadline: Duration::from_secs(5 * 60),
        }
    }
}

enum PollOutcome {
    Reconciled(PollReconciliation),
    Deferred(PollId),
    Failed(PollFailure),
}

/// Domain service implementing [`VoteSummarizer`].
#[derive(Clone)]
pub struct VoteReconciler<R> {
    result_repo: Arc<R>,
    clock: Arc<dyn Clock>,
    config: VoteReconcilerConfig,
}

impl<R> VoteReconciler<R> {
    /// Create a reconciler over the result store.
    pub fn new(result_repo: Arc<R>, clock: Arc<dyn Clock>, config: VoteReconcilerConfig) -> Self {
        Self {
            result_repo,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &VoteReconcilerConfig {
        &self.config
    }
}

impl<R> VoteReconciler<R>
where
    R: PollResultRepository,
{
    /// Run passes every `interval` until `shutdown` resolves.
    ///
    /// Returns the number of passes started.
    pub async fn run_periodically<F>(&self, interval: Duration, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        run_periodically(self, interval, shutdown).await
    }

    async fn reconcile_poll(&self, poll_id: PollId, deadline: Instant) -> PollOutcome {
        if Instant::now() >= deadline {
            return PollOutcome::Deferred(poll_id);
        }

        // Dropping the unit releases its pooled connection mid-transaction, so
        // PostgreSQL rolls back the partial ledger update and advisory lock.
        let unit = self.result_repo.process_votes(&poll_id, self.clock.utc());
        let Ok(result) = timeout_at(deadline, unit).await else {
            warn!(poll_id = %poll_id, "run deadline elapsed mid-unit; poll deferred");
            return PollOutcome::Deferred(poll_id);
        };

        match result {
            Ok(processed) => {
                debug!(
                    poll_id = %poll_id,
                    credited = processed.credited,
                    debited = processed.debited,
                    "poll reconciled"
                );
                PollOutcome::Reconciled(PollReconciliation { poll_id, processed })
            }
            Err(source) => {
                warn!(poll_id = %poll_id, error = %source, "poll reconciliation failed");
                PollOutcome::Failed(PollFailure { poll_id, source })
            }
        }
    }
}

#[async_trait]
impl<R> VoteSummarizer for VoteReconciler<R>
where
    R: PollResultRepository,
{
    async fn summarize_all_votes(&self) -> Result<ReconciliationReport, ReconciliationError> {
        let started = Instant::now();
        let deadline = started + self.config.run_deadline;

        let discovery = self.result_repo.polls_with_unprocessed_votes();
        let poll_ids = timeout_at(deadline, discovery)
            .await
            .map_err(|_| ReconciliationError::DiscoveryTimedOut {
                deadline: self.config.run_deadline,
            })?
            .map_err(ReconciliationError::Discovery)?;
        info!(polls = poll_ids.len(), "reconciliation pass started");

        let outcomes: Vec<PollOutcome> = stream::iter(poll_ids)
            .map(|poll_id| self.reconcile_poll(poll_id, deadline))
            .buffer_unordered(self.config.max_concurrent_polls.max(1))
            .collect()
            .await;

        let mut report = ReconciliationReport::default();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                PollOutcome::Reconciled(poll) => report.reconciled.push(poll),
                PollOutcome::Deferred(poll_id) => report.deferred.push(poll_id),
                PollOutcome::Failed(failure) => failures.push(failure),
            }
        }
        report.reconciled.sort_by_key(|poll| poll.poll_id);
        report.deferred.sort();
        failures.sort_by_key(|failure| failure.poll_id);
        report.elapsed = started.elapsed();

        if !report.deferred.is_empty() {
            warn!(
                deferred = report.deferred.len(),
                "run deadline elapsed; remaining polls deferred to next pass"
            );
        }
        info!(
            reconciled = report.reconciled.len(),
            failed = failures.len(),
            credited = report.credited(),
            debited = report.debited(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "reconciliation pass finished"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ReconciliationError::Partial { failures, report })
        }
    }
}
