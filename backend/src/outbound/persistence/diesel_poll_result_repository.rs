//! PostgreSQL-backed result store and reconciliation unit.
//!
//! `process_votes` runs in one transaction per poll:
//! 1. take the poll's reconciliation advisory lock;
//! 2. lock the pending/active and valid/deleted ledger rows `FOR UPDATE`;
//! 3. flip their status to `valid` / `invalid`;
//! 4. apply the net per-option delta with `vote_count = vote_count + delta`.
//!
//! The delta is always re-derived from the rows' current state, so a unit
//! that rolls back is simply redone by the next pass.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{PollResultRepository, PollResultRepositoryError, ProcessedVotes};
use crate::domain::{OptionId, PollId, PollResult, TallyDelta, VoteStatus};

use super::advisory_lock::{lock_for_transaction, poll_reconciliation_key};
use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{PollResultDeltaRow, PollResultRow};
use super::pool::{DbPool, PoolError};
use super::schema::{poll_results, votes};

/// Diesel-backed implementation of the result store port.
#[derive(Clone)]
pub struct DieselPollResultRepository {
    pool: DbPool,
}

impl DieselPollResultRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> PollResultRepositoryError {
    map_pool_error(error, PollResultRepositoryError::connection)
}

fn map_query_error(
    operation: &'static str,
) -> impl Fn(diesel::result::Error) -> PollResultRepositoryError {
    move |error| {
        map_diesel_error(
            error,
            operation,
            PollResultRepositoryError::query,
            PollResultRepositoryError::connection,
        )
    }
}

/// Ids and options of the ledger rows locked for one side of the delta.
async fn lock_batch(
    conn: &mut AsyncPgConnection,
    poll_id: Uuid,
    status: VoteStatus,
    deleted: bool,
) -> QueryResult<Vec<(Uuid, Uuid)>> {
    let scoped = votes::table
        .filter(votes::poll_id.eq(poll_id))
        .filter(votes::status.eq(status.as_str()));
    if deleted {
        scoped
            .filter(votes::deleted_at.is_not_null())
            .select((votes::id, votes::option_id))
            .order(votes::id.asc())
            .for_update()
            .load(conn)
            .await
    } else {
        scoped
            .filter(votes::deleted_at.is_null())
            .select((votes::id, votes::option_id))
            .order(votes::id.asc())
            .for_update()
            .load(conn)
            .await
    }
}

async fn set_status(
    conn: &mut AsyncPgConnection,
    rows: &[(Uuid, Uuid)],
    status: VoteStatus,
) -> QueryResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = rows.iter().map(|(id, _)| *id).collect();
    diesel::update(votes::table.filter(votes::id.eq_any(ids)))
        .set(votes::status.eq(status.as_str()))
        .execute(conn)
        .await
        .map(|_| ())
}

async fn apply_delta(
    conn: &mut AsyncPgConnection,
    poll_id: Uuid,
    delta: &TallyDelta,
    at: DateTime<Utc>,
) -> QueryResult<()> {
    for (option_id, by) in delta.entries() {
        diesel::insert_into(poll_results::table)
            .values(PollResultDeltaRow {
                poll_id,
                option_id: *option_id.as_uuid(),
                vote_count: by,
                last_updated_at: at,
            })
            .on_conflict((poll_results::poll_id, poll_results::option_id))
            .do_update()
            .set((
                poll_results::vote_count
                    .eq(poll_results::vote_count + excluded(poll_results::vote_count)),
                poll_results::last_updated_at.eq(excluded(poll_results::last_updated_at)),
            ))
            .execute(conn)
            .await?;
    }
    Ok(())
}

fn tally(credited: &[(Uuid, Uuid)], debited: &[(Uuid, Uuid)]) -> TallyDelta {
    let mut delta = TallyDelta::default();
    for (_, option_id) in credited {
        delta.credit(OptionId::from_uuid(*option_id));
    }
    for (_, option_id) in debited {
        delta.debit(OptionId::from_uuid(*option_id));
    }
    delta
}

fn count(rows: &[(Uuid, Uuid)]) -> u64 {
    u64::try_from(rows.len()).unwrap_or(u64::MAX)
}

#[async_trait]
impl PollResultRepository for DieselPollResultRepository {
    async fn polls_with_unprocessed_votes(&self) -> Result<Vec<PollId>, PollResultRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let poll_ids: Vec<Uuid> = votes::table
            .filter(
                votes::status
                    .eq(VoteStatus::Pending.as_str())
                    .and(votes::deleted_at.is_null())
                    .or(votes::status
                        .eq(VoteStatus::Valid.as_str())
                        .and(votes::deleted_at.is_not_null())),
            )
            .select(votes::poll_id)
            .distinct()
            .order(votes::poll_id.asc())
            .load(&mut conn)
            .await
            .map_err(map_query_error("list polls with unprocessed votes"))?;
        Ok(poll_ids.into_iter().map(PollId::from_uuid).collect())
    }

    async fn process_votes(
        &self,
        poll_id: &PollId,
        at: DateTime<Utc>,
    ) -> Result<ProcessedVotes, PollResultRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let lock_key = poll_reconciliation_key(poll_id);
        let poll_uuid = *poll_id.as_uuid();
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                lock_for_transaction(conn, lock_key).await?;

                // Credit before debit so a vote switched twice between passes
                // nets out within this transaction.
                let credited = lock_batch(conn, poll_uuid, VoteStatus::Pending, false).await?;
                let debited = lock_batch(conn, poll_uuid, VoteStatus::Valid, true).await?;

                set_status(conn, &credited, VoteStatus::Valid).await?;
                set_status(conn, &debited, VoteStatus::Invalid).await?;
                apply_delta(conn, poll_uuid, &tally(&credited, &debited), at).await?;

                Ok(ProcessedVotes {
                    credited: count(&credited),
                    debited: count(&debited),
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_query_error("process votes"))
    }

    async fn find_results(
        &self,
        poll_id: &PollId,
    ) -> Result<Vec<PollResult>, PollResultRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let rows = poll_results::table
            .filter(poll_results::poll_id.eq(poll_id.as_uuid()))
            .order(poll_results::option_id.asc())
            .select(PollResultRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_query_error("load poll results"))?;
        Ok(rows.into_iter().map(PollResult::from).collect())
    }
}
