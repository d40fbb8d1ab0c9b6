//! Driving port for reading a user's vote and poll statistics.

use async_trait::async_trait;

use crate::domain::{PollId, PollStats, UserId, Vote, VoteError};

/// Port for vote and result reads.
#[async_trait]
pub trait VoteQuery: Send + Sync {
    /// The user's active vote on the poll, or [`VoteError::VoteNotFound`].
    async fn get_user_vote(&self, poll_id: &PollId, user_id: &UserId) -> Result<Vote, VoteError>;

    /// Per-option counts and percentages, visible only to users holding an
    /// active vote on the poll.
    async fn get_poll_option_stats(
        &self,
        poll_id: &PollId,
        requester: &UserId,
    ) -> Result<PollStats, VoteError>;
}
