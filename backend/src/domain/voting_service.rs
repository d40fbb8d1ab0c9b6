//! Vote ledger domain services.
//!
//! `VoteCommandService` validates votes against the poll's option set and
//! appends or soft-deletes ledger rows. `VoteQueryService` reads the active
//! vote and turns result store counters into percentage stats. Neither ever
//! touches `PollResult` counters or vote status.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info};

use crate::domain::ports::{
    CastVoteOutcome, CastVoteRequest, CastVoteResponse, PollRepository, PollRepositoryError,
    PollResultRepository, PollResultRepositoryError, VoteCommand, VoteQuery, VoteRepository,
    VoteRepositoryError,
};
use crate::domain::{Poll, PollId, PollStats, UserId, Vote, VoteError};

fn map_poll_repository_error(error: PollRepositoryError) -> VoteError {
    match error {
        PollRepositoryError::Connection { message } => {
            VoteError::unavailable(format!("poll repository unavailable: {message}"))
        }
        PollRepositoryError::Query { message } => {
            VoteError::internal(format!("poll repository error: {message}"))
        }
    }
}

fn map_vote_repository_error(error: VoteRepositoryError) -> VoteError {
    match error {
        VoteRepositoryError::Connection { message } => {
            VoteError::unavailable(format!("vote repository unavailable: {message}"))
        }
        VoteRepositoryError::Query { message } => {
            VoteError::internal(format!("vote repository error: {message}"))
        }
        VoteRepositoryError::ActiveVoteConflict { .. } => VoteError::AlreadyVoted,
    }
}

fn map_result_repository_error(error: PollResultRepositoryError) -> VoteError {
    match error {
        PollResultRepositoryError::Connection { message } => {
            VoteError::unavailable(format!("poll result repository unavailable: {message}"))
        }
        PollResultRepositoryError::Query { message } => {
            VoteError::internal(format!("poll result repository error: {message}"))
        }
    }
}

async fn load_poll<P: PollRepository>(poll_repo: &P, poll_id: &PollId) -> Result<Poll, VoteError> {
    poll_repo
        .find_by_id(poll_id)
        .await
        .map_err(map_poll_repository_error)?
        .ok_or(VoteError::PollNotFound { poll_id: *poll_id })
}

/// Vote ledger service implementing the command driving port.
#[derive(Clone)]
pub struct VoteCommandService<P, V> {
    poll_repo: Arc<P>,
    vote_repo: Arc<V>,
    clock: Arc<dyn Clock>,
}

impl<P, V> VoteCommandService<P, V> {
    /// Create a command service over the poll and vote repositories.
    pub fn new(poll_repo: Arc<P>, vote_repo: Arc<V>, clock: Arc<dyn Clock>) -> Self {
        Self {
            poll_repo,
            vote_repo,
            clock,
        }
    }
}

#[async_trait]
impl<P, V> VoteCommand for VoteCommandService<P, V>
where
    P: PollRepository,
    V: VoteRepository,
{
    async fn vote(&self, request: CastVoteRequest) -> Result<CastVoteResponse, VoteError> {
        let poll = load_poll(self.poll_repo.as_ref(), &request.poll_id).await?;
        if !poll.has_option(&request.option_id) {
            return Err(VoteError::InvalidOption {
                poll_id: request.poll_id,
                option_id: request.option_id,
            });
        }

        // Cheap rejection of repeated clicks; cast_vote re-checks under lock.
        let repeated = self
            .vote_repo
            .has_voted_on_option(&request.poll_id, &request.user_id, &request.option_id)
            .await
            .map_err(map_vote_repository_error)?;
        if repeated {
            debug!(
                poll_id = %request.poll_id,
                user_id = %request.user_id,
                "duplicate vote rejected"
            );
            return Err(VoteError::AlreadyVoted);
        }

        let vote = Vote::pending(request.into(), self.clock.utc());
        let outcome = self
            .vote_repo
            .cast_vote(&vote)
            .await
            .map_err(map_vote_repository_error)?;

        let switched_from = match outcome {
            CastVoteOutcome::Recorded => None,
            CastVoteOutcome::Switched { previous } => Some(previous.option_id),
            CastVoteOutcome::AlreadyVoted { .. } => return Err(VoteError::AlreadyVoted),
        };
        info!(
            poll_id = %vote.poll_id,
            option_id = %vote.option_id,
            vote_id = %vote.id,
            switched = switched_from.is_some(),
            "vote recorded"
        );

        Ok(CastVoteResponse {
            vote,
            switched_from,
        })
    }

    async fn unvote(&self, poll_id: &PollId, user_id: &UserId) -> Result<(), VoteError> {
        let retracted = self
            .vote_repo
            .retract_vote(poll_id, user_id, self.clock.utc())
            .await
            .map_err(map_vote_repository_error)?
            .ok_or(VoteError::DidNotVote)?;

        info!(
            poll_id = %poll_id,
            vote_id = %retracted.id,
            status = %retracted.status,
            "vote retracted"
        );
        Ok(())
    }
}

/// Read-side service implementing the query driving port.
#[derive(Clone)]
pub struct VoteQueryService<P, V, R> {
    poll_repo: Arc<P>,
    vote_repo: Arc<V>,
    result_repo: Arc<R>,
}

impl<P, V, R> VoteQueryService<P, V, R> {
    /// Create a query service over the poll, vote, and result repositories.
    pub fn new(poll_repo: Arc<P>, vote_repo: Arc<V>, result_repo: Arc<R>) -> Self {
        Self {
            poll_repo,
            vote_repo,
            result_repo,
        }
    }
}

#[async_trait]
impl<P, V, R> VoteQuery for VoteQueryService<P, V, R>
where
    P: PollRepository,
    V: VoteRepository,
    R: PollResultRepository,
{
    async fn get_user_vote(&self, poll_id: &PollId, user_id: &UserId) -> Result<Vote, VoteError> {
        self.vote_repo
            .find_active_vote(poll_id, user_id)
            .await
            .map_err(map_vote_repository_error)?
            .ok_or(VoteError::VoteNotFound)
    }

    async fn get_poll_option_stats(
        &self,
        poll_id: &PollId,
        requester: &UserId,
    ) -> Result<PollStats, VoteError> {
        load_poll(self.poll_repo.as_ref(), poll_id).await?;

        let voted = self
            .vote_repo
            .has_voted(poll_id, requester)
            .await
            .map_err(map_vote_repository_error)?;
        if !voted {
            return Err(VoteError::UserNotVoted);
        }

        let results = self
            .result_repo
            .find_results(poll_id)
            .await
            .map_err(map_result_repository_error)?;
        Ok(PollStats::from_results(poll_id, &results))
    }
}

#[cfg(test)]
#[path = "voting_service_tests.rs"]
mod tests;
