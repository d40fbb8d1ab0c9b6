//! Port for the append-only, soft-deletable vote ledger.
//!
//! Adapters must guarantee that at most one vote per `(poll_id, user_id)` has
//! no `deleted_at`, even under concurrent writers. `cast_vote` is the single
//! authoritative check-then-act unit; the read helpers are advisory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{OptionId, PollId, UserId, Vote};

use super::define_port_error;

define_port_error! {
    /// Errors raised by vote repository adapters.
    pub enum VoteRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "vote repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "vote repository query failed: {message}",
        /// A concurrent writer already holds the active vote slot.
        ActiveVoteConflict { message: String } =>
            "active vote already exists: {message}",
    }
}

/// Result of appending a vote to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastVoteOutcome {
    /// No active vote existed; the new row was inserted.
    Recorded,
    /// An active vote for another option was soft-deleted and the new row
    /// inserted in the same transaction.
    Switched { previous: Box<Vote> },
    /// The active vote already targets the requested option; nothing written.
    AlreadyVoted { existing: Box<Vote> },
}

/// Port for vote ledger persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Append `vote` as the user's active vote, switching away from any
    /// active vote for a different option.
    ///
    /// The previous vote is soft-deleted at `vote.created_at`.
    async fn cast_vote(&self, vote: &Vote) -> Result<CastVoteOutcome, VoteRepositoryError>;

    /// True when the user's active vote for the poll targets `option_id`.
    async fn has_voted_on_option(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        option_id: &OptionId,
    ) -> Result<bool, VoteRepositoryError>;

    /// Soft-delete the user's active vote, returning it; `None` when there was
    /// nothing to retract. Status is left untouched.
    async fn retract_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Vote>, VoteRepositoryError>;

    /// True when the user holds an active vote on the poll.
    async fn has_voted(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<bool, VoteRepositoryError>;

    /// The user's active vote on the poll, if any.
    async fn find_active_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<Option<Vote>, VoteRepositoryError>;
}
