//! Pass outcomes and aggregated failures.

use std::time::Duration;

use serde::Serialize;

use crate::domain::PollId;
use crate::domain::ports::{PollResultRepositoryError, ProcessedVotes};

/// Settled counts for one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollReconciliation {
    pub poll_id: PollId,
    #[serde(flatten)]
    pub processed: ProcessedVotes,
}

/// Summary of one reconciliation pass.
///
/// Polls listed in `deferred` were not started before the run deadline, or
/// were still running when it elapsed and rolled back. The next pass picks
/// them up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub reconciled: Vec<PollReconciliation>,
    pub deferred: Vec<PollId>,
    pub elapsed: Duration,
}

impl ReconciliationReport {
    /// Total votes marked valid across every poll.
    pub fn credited(&self) -> u64 {
        self.reconciled
            .iter()
            .map(|poll| poll.processed.credited)
            .sum()
    }

    /// Total votes marked invalid across every poll.
    pub fn debited(&self) -> u64 {
        self.reconciled
            .iter()
            .map(|poll| poll.processed.debited)
            .sum()
    }

    /// Outcome for `poll_id`, if it was reconciled in this pass.
    pub fn for_poll(&self, poll_id: &PollId) -> Option<&PollReconciliation> {
        self.reconciled.iter().find(|poll| poll.poll_id == *poll_id)
    }
}

/// A single poll whose reconciliation unit failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("poll {poll_id}: {source}")]
pub struct PollFailure {
    pub poll_id: PollId,
    #[source]
    pub source: PollResultRepositoryError,
}

/// Errors returned by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconciliationError {
    /// Polls awaiting reconciliation could not be listed; nothing ran.
    #[error("failed to list polls with unprocessed votes: {0}")]
    Discovery(#[source] PollResultRepositoryError),
    /// Listing polls did not finish before the run deadline; nothing ran.
    #[error("poll discovery exceeded the {}s run deadline", .deadline.as_secs())]
    DiscoveryTimedOut { deadline: Duration },
    /// Every poll was attempted and at least one failed.
    #[error("{} poll(s) failed to reconcile: {}", .failures.len(), join_failures(.failures))]
    Partial {
        failures: Vec<PollFailure>,
        report: ReconciliationReport,
    },
}

impl ReconciliationError {
    /// Failed polls; empty for discovery errors.
    pub fn failures(&self) -> &[PollFailure] {
        match self {
            Self::Discovery(_) | Self::DiscoveryTimedOut { .. } => &[],
            Self::Partial { failures, .. } => failures,
        }
    }

    /// Work that committed before the failure was reported.
    pub fn partial_report(&self) -> Option<&ReconciliationReport> {
        match self {
            Self::Discovery(_) | Self::DiscoveryTimedOut { .. } => None,
            Self::Partial { report, .. } => Some(report),
        }
    }
}

fn join_failures(failures: &[PollFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
