//! Port for the result store and the per-poll reconciliation unit.
//!
//! `process_votes` is the only writer of `PollResult::vote_count` and of vote
//! status transitions. Adapters run it as one atomic unit per poll, re-derive
//! the delta from current ledger state on every call, and serialise
//! overlapping calls for the same poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{PollId, PollResult};

use super::define_port_error;

define_port_error! {
    /// Errors raised by result store adapters.
    pub enum PollResultRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "poll result repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "poll result repository query failed: {message}",
    }
}

/// Number of ledger rows settled by one reconciliation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedVotes {
    /// Pending, active votes marked valid and added to the counters.
    pub credited: u64,
    /// Valid, soft-deleted votes marked invalid and subtracted.
    pub debited: u64,
}

impl ProcessedVotes {
    /// True when the unit found nothing to settle.
    pub const fn is_empty(&self) -> bool {
        self.credited == 0 && self.debited == 0
    }
}

/// Port for result store reads and reconciliation writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollResultRepository: Send + Sync {
    /// Polls that have votes awaiting credit or debit.
    async fn polls_with_unprocessed_votes(&self) -> Result<Vec<PollId>, PollResultRepositoryError>;

    /// Credit pending votes and debit retracted valid votes for one poll,
    /// stamping touched counters with `at`.
    async fn process_votes(
        &self,
        poll_id: &PollId,
        at: DateTime<Utc>,
    ) -> Result<ProcessedVotes, PollResultRepositoryError>;

    /// Every result row for the poll.
    async fn find_results(
        &self,
        poll_id: &PollId,
    ) -> Result<Vec<PollResult>, PollResultRepositoryError>;
}
