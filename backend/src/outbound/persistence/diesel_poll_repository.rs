//! PostgreSQL-backed poll lookup adapter.

use async_trait::async_trait;
use diesel::OptionalExtension;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{PollRepository, PollRepositoryError};
use crate::domain::{Poll, PollId};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{PollOptionRow, PollRow};
use super::pool::DbPool;
use super::schema::{poll_options, polls};

/// Diesel-backed implementation of the poll repository port.
#[derive(Clone)]
pub struct DieselPollRepository {
    pool: DbPool,
}

impl DieselPollRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_query_error(error: diesel::result::Error) -> PollRepositoryError {
    map_diesel_error(
        error,
        "poll lookup",
        PollRepositoryError::query,
        PollRepositoryError::connection,
    )
}

#[async_trait]
impl PollRepository for DieselPollRepository {
    async fn find_by_id(&self, poll_id: &PollId) -> Result<Option<Poll>, PollRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, PollRepositoryError::connection))?;

        let Some(row) = polls::table
            .find(poll_id.as_uuid())
            .select(PollRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_query_error)?
        else {
            return Ok(None);
        };

        let options = poll_options::table
            .filter(poll_options::poll_id.eq(poll_id.as_uuid()))
            .order((poll_options::position.asc(), poll_options::id.asc()))
            .select(PollOptionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_query_error)?;

        Ok(Some(row.into_domain(options)))
    }
}
