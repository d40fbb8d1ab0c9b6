//! PostgreSQL-backed vote ledger adapter.
//!
//! `cast_vote` runs its check-then-act under a transaction-scoped advisory
//! lock keyed on `(poll, user)`. The partial unique index
//! `votes_one_active_per_user` backs that up for writers that bypass the lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::OptionalExtension;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{CastVoteOutcome, VoteRepository, VoteRepositoryError};
use crate::domain::{OptionId, PollId, UserId, Vote};

use super::advisory_lock::{lock_for_transaction, user_vote_key};
use super::diesel_error_mapping::{is_active_vote_violation, map_diesel_error, map_pool_error};
use super::models::{NewVoteRow, VoteRow};
use super::pool::{DbPool, PoolError};
use super::schema::votes;

/// Diesel-backed implementation of the vote repository port.
#[derive(Clone)]
pub struct DieselVoteRepository {
    pool: DbPool,
}

impl DieselVoteRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

enum CastRowOutcome {
    Recorded,
    Switched(VoteRow),
    AlreadyVoted(VoteRow),
}

fn map_pool(error: PoolError) -> VoteRepositoryError {
    map_pool_error(error, VoteRepositoryError::connection)
}

fn map_query_error(error: diesel::result::Error) -> VoteRepositoryError {
    map_diesel_error(
        error,
        "vote ledger operation",
        VoteRepositoryError::query,
        VoteRepositoryError::connection,
    )
}

fn map_cast_error(error: diesel::result::Error) -> VoteRepositoryError {
    if is_active_vote_violation(&error) {
        return VoteRepositoryError::active_vote_conflict(error.to_string());
    }
    map_query_error(error)
}

fn to_domain(row: VoteRow) -> Result<Vote, VoteRepositoryError> {
    Vote::try_from(row).map_err(|err| VoteRepositoryError::query(err.to_string()))
}

#[async_trait]
impl VoteRepository for DieselVoteRepository {
    async fn cast_vote(&self, vote: &Vote) -> Result<CastVoteOutcome, VoteRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let new_row = NewVoteRow::from(vote);
        let lock_key = user_vote_key(&vote.poll_id, &vote.user_id);
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let outcome = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    lock_for_transaction(conn, lock_key).await?;

                    let active = votes::table
                        .filter(votes::poll_id.eq(new_row.poll_id))
                        .filter(votes::user_id.eq(new_row.user_id))
                        .filter(votes::deleted_at.is_null())
                        .select(VoteRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;

                    let outcome = match active {
                        Some(row) if row.option_id == new_row.option_id => {
                            return Ok(CastRowOutcome::AlreadyVoted(row));
                        }
                        Some(row) => {
                            diesel::update(votes::table.find(row.id))
                                .set(votes::deleted_at.eq(Some(new_row.created_at)))
                                .execute(conn)
                                .await?;
                            CastRowOutcome::Switched(row)
                        }
                        None => CastRowOutcome::Recorded,
                    };

                    diesel::insert_into(votes::table)
                        .values(&new_row)
                        .execute(conn)
                        .await?;
                    Ok(outcome)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_cast_error)?;

        match outcome {
            CastRowOutcome::Recorded => Ok(CastVoteOutcome::Recorded),
            CastRowOutcome::Switched(previous) => {
                debug!(
                    poll_id = %vote.poll_id,
                    previous_vote = %previous.id,
                    "active vote switched"
                );
                Ok(CastVoteOutcome::Switched {
                    previous: Box::new(to_domain(previous)?),
                })
            }
            CastRowOutcome::AlreadyVoted(existing) => Ok(CastVoteOutcome::AlreadyVoted {
                existing: Box::new(to_domain(existing)?),
            }),
        }
    }

    async fn has_voted_on_option(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        option_id: &OptionId,
    ) -> Result<bool, VoteRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        diesel::select(exists(
            votes::table
                .filter(votes::poll_id.eq(poll_id.as_uuid()))
                .filter(votes::user_id.eq(user_id.as_uuid()))
                .filter(votes::option_id.eq(option_id.as_uuid()))
                .filter(votes::deleted_at.is_null()),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_query_error)
    }

    async fn retract_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Vote>, VoteRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = diesel::update(
            votes::table
                .filter(votes::poll_id.eq(poll_id.as_uuid()))
                .filter(votes::user_id.eq(user_id.as_uuid()))
                .filter(votes::deleted_at.is_null()),
        )
        .set(votes::deleted_at.eq(Some(at)))
        .returning(VoteRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_query_error)?;
        row.map(to_domain).transpose()
    }

    async fn has_voted(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<bool, VoteRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        diesel::select(exists(
            votes::table
                .filter(votes::poll_id.eq(poll_id.as_uuid()))
                .filter(votes::user_id.eq(user_id.as_uuid()))
                .filter(votes::deleted_at.is_null()),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_query_error)
    }

    async fn find_active_vote(
        &self,
        poll_id: &PollId,
        user_id: &UserId,
    ) -> Result<Option<Vote>, VoteRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = votes::table
            .filter(votes::poll_id.eq(poll_id.as_uuid()))
            .filter(votes::user_id.eq(user_id.as_uuid()))
            .filter(votes::deleted_at.is_null())
            .select(VoteRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_query_error)?;
        row.map(to_domain).transpose()
    }
}
