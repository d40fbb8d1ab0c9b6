//! Driving port for running one reconciliation pass over every poll.

use async_trait::async_trait;

use crate::domain::reconciliation::{ReconciliationError, ReconciliationReport};

/// Port invoked by schedulers and operators to drain the ledger into the
/// result store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteSummarizer: Send + Sync {
    /// Reconcile every poll with unprocessed votes.
    ///
    /// Per-poll failures never stop other polls; they are reported together
    /// once every poll has been attempted.
    async fn summarize_all_votes(&self) -> Result<ReconciliationReport, ReconciliationError>;
}
