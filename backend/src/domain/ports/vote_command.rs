//! Driving port for vote ledger mutations.
//!
//! Callers pass an already authenticated principal; this port validates the
//! poll and option, then appends or soft-deletes ledger rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{OptionId, PollId, UserId, Vote, VoteDraft, VoteError};

/// Request to cast or switch a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
    pub voter_ip: String,
}

impl From<CastVoteRequest> for VoteDraft {
    fn from(value: CastVoteRequest) -> Self {
        Self {
            poll_id: value.poll_id,
            option_id: value.option_id,
            user_id: value.user_id,
            voter_ip: value.voter_ip,
        }
    }
}

/// Outcome of a successful vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    /// The newly appended pending vote.
    pub vote: Vote,
    /// Option of the vote that was soft-deleted by this switch, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switched_from: Option<OptionId>,
}

/// Port for casting, switching, and retracting votes.
#[async_trait]
pub trait VoteCommand: Send + Sync {
    /// Cast a vote, switching away from any active vote for another option.
    async fn vote(&self, request: CastVoteRequest) -> Result<CastVoteResponse, VoteError>;

    /// Retract the user's active vote on the poll.
    async fn unvote(&self, poll_id: &PollId, user_id: &UserId) -> Result<(), VoteError>;
}
