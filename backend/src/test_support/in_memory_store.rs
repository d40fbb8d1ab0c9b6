//! In-memory implementation of the ledger's driven ports.
//!
//! Mirrors the PostgreSQL adapters closely enough for scenario tests: at most
//! one active vote per `(poll, user)`, soft deletes, and reconciliation that
//! credits before it debits and only ever adds a delta to the counters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    CastVoteOutcome, PollRepository, PollRepositoryError, PollResultRepository,
    PollResultRepositoryError, ProcessedVotes, VoteRepository, VoteRepositoryError,
};
use crate::domain::{
    OptionId, Poll, PollId, PollOption, PollResult, TallyDelta, UserId, Vote, VoteStatus,
};

/// Build a poll with one option per entry of `labels`.
pub fn poll_with_options(title: &str, labels: &[&str], created_at: DateTime<Utc>) -> Poll {
    let id = PollId::random();
    Poll {
        id,
        title: title.to_owned(),
        description: None,
        options: labels
            .iter()
            .map(|text| PollOption {
                id: OptionId::random(),
                poll_id: id,
                text: (*text).to_owned(),
            })
            .collect(),
        created_at,
        expires_at: None,
    }
}

#[derive(Default)]
struct LedgerState {
    polls: HashMap<PollId, Poll>,
    votes: Vec<Vote>,
    results: BTreeMap<(PollId, OptionId), PollResult>,
    failing_polls: HashSet<PollId>,
}

/// Shared fake backing the poll, vote, and result ports.
#[derive(Default)]
pub struct InMemoryVoteStore {
    state: Mutex<LedgerState>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_poll(&self, poll: Poll) {
        self.lock().polls.insert(poll.id, poll);
    }

    /// Make every subsequent `process_votes` call for `poll_id` fail.
    pub fn fail_processing(&self, poll_id: PollId) {
        self.lock().failing_polls.insert(poll_id);
    }

    /// Every ledger row for the poll, oldest first.
    pub fn votes_for(&self, poll_id: &PollId) -> Vec<Vote> {
        self.lock()
            .votes
            .iter()
            .filter(|vote| vote.poll_id == *poll_id)
            .cloned()
            .collect()
    }

    /// Active, valid votes for one option: what a quiescent counter must equal.
    pub fn valid_active_count(&self, poll_id: &PollId, option_id: &OptionId) -> i64 {
        let count = self
            .lock()
            .votes
            .iter()
            .filter(|vote| {
                vote.poll_id == *poll_id
                    && vote.option_id == *option_id
                    && vote.is_active()
                    && vote.status == VoteStatus::Valid
            })
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    /// Stored counter for one option; zero when no row exists.
    pub fn result_count(&self, poll_id: &PollId, option_id: &OptionId) -> i64 {
        self.lock()
            .results
            .get(&(*poll_id, *option_id))
            .map_or(0, |result| result.vote_count)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn active_position(state: &LedgerState, poll_id: &PollId, user_id: &UserId) -> Option<usize> {
    state
        .votes
        .iter()
        .position(|vote| vote.poll_id == *poll_id && vote.user_id == *user_id && vote.is_active())
}

#[async_trait]
impl PollRepository for InMemoryVoteStore {
    async fn find_by_id(&self, poll_id: &PollId) -> Result<Option<Poll>, PollRepositoryError> {
        Ok(self.lock().polls.get(poll_id).cloned())
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteStore {
    async fn cast_vote(&self, vote: &Vote) -> Result<CastVoteOutcome, VoteRepositoryError> {
        let mut state = self.lock();
        let outcome = match active_position(&state, &vote.poll_id, &vote.user_id) {
            Some(index) if state.votes[index].option_id == vote.option_id => {
                return Ok(CastVoteOutcome::AlreadyVoted {
                    existing: Box::new(state.votes[index].clone()),
                });
            }
            Some(index) => {
                let previous = state.votes[index].clone();
                state.votes[index].deleted_at = Some(vote.created_at);
                CastVoteOutcome::Switched {
                    previous: Box::new(previous),
                }
            }
            None => CastVoteOutcome::Recorded,
        };
        state.votes.push(vote.clone());
        Ok(outcome)
    }

    async fn has_voted_on_option(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        option_id: &OptionId,
    ) -> Result<bool, VoteRepositoryError> {
        let state = self.lock();
        Ok(active_position(&state, poll_id, user_id)
            .is_some_and(|index| state.votes[index].option_id == *option_id))
    }

    async fn retract_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Vote>, VoteRepositoryError> {
        let mut state = self.lock();
        Ok(active_position(&state, poll_id, user_id).map(|index| {
            state.votes[index].deleted_at = Some(at);
            state.votes[index].clone()
        }))
    }

    async fn has_voted(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<bool, VoteRepositoryError> {
        Ok(active_position(&self.lock(), poll_id, user_id).is_some())
    }

    async fn find_active_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<Option<Vote>, VoteRepositoryError> {
        let state = self.lock();
        Ok(active_position(&state, poll_id, user_id).map(|index| state.votes[index].clone()))
    }
}

#[async_trait]
impl PollResultRepository for InMemoryVoteStore {
    async fn polls_with_unprocessed_votes(&self) -> Result<Vec<PollId>, PollResultRepositoryError> {
        let polls: std::collections::BTreeSet<PollId> = self
            .lock()
            .votes
            .iter()
            .filter(|vote| vote.awaits_credit() || vote.awaits_debit())
            .map(|vote| vote.poll_id)
            .collect();
        Ok(polls.into_iter().collect())
    }

    async fn process_votes(
        &self,
        poll_id: &PollId,
        at: DateTime<Utc>,
    ) -> Result<ProcessedVotes, PollResultRepositoryError> {
        let mut state = self.lock();
        if state.failing_polls.contains(poll_id) {
            return Err(PollResultRepositoryError::query(format!(
                "processing disabled for poll {poll_id}"
            )));
        }

        let in_poll = |vote: &Vote| vote.poll_id == *poll_id;
        let credited: Vec<Vote> = state
            .votes
            .iter()
            .filter(|vote| in_poll(vote) && vote.awaits_credit())
            .cloned()
            .collect();
        let debited: Vec<Vote> = state
            .votes
            .iter()
            .filter(|vote| in_poll(vote) && vote.awaits_debit())
            .cloned()
            .collect();

        for vote in state.votes.iter_mut().filter(|vote| in_poll(vote)) {
            if vote.awaits_credit() {
                vote.status = VoteStatus::Valid;
            } else if vote.awaits_debit() {
                vote.status = VoteStatus::Invalid;
            }
        }

        let delta = TallyDelta::from_batches(&credited, &debited);
        for (option_id, by) in delta.entries() {
            state
                .results
                .entry((*poll_id, option_id))
                .and_modify(|result| {
                    result.vote_count += by;
                    result.last_updated_at = at;
                })
                .or_insert(PollResult {
                    poll_id: *poll_id,
                    option_id,
                    vote_count: by,
                    last_updated_at: at,
                });
        }

        Ok(ProcessedVotes {
            credited: u64::try_from(credited.len()).unwrap_or(u64::MAX),
            debited: u64::try_from(debited.len()).unwrap_or(u64::MAX),
        })
    }

    async fn find_results(
        &self,
        poll_id: &PollId,
    ) -> Result<Vec<PollResult>, PollResultRepositoryError> {
        Ok(self
            .lock()
            .results
            .values()
            .filter(|result| result.poll_id == *poll_id)
            .cloned()
            .collect())
    }
}
