//! Shared Diesel error mapping for the ledger repositories.
//!
//! Each repository passes its own port error constructors so the mapping
//! stays in one place while the error types remain per-port.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Name of the partial unique index guarding the single active vote.
pub(crate) const ACTIVE_VOTE_INDEX: &str = "votes_one_active_per_user";

/// Map pool errors into a repository-specific connection error constructor.
pub(crate) fn map_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    connection(error.to_string())
}

/// Map Diesel errors into query or connection constructors, keeping the
/// operation name in the message.
pub(crate) fn map_diesel_error<E, Q, C>(
    error: DieselError,
    operation: &str,
    query: Q,
    connection: C,
) -> E
where
    Q: FnOnce(String) -> E,
    C: FnOnce(String) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(error = %error, %operation, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection(format!("{operation}: database connection closed"))
        }
        DieselError::NotFound => query(format!("{operation}: record not found")),
        other => query(format!("{operation}: {other}")),
    }
}

/// True when `error` is a unique violation on the active-vote index.
pub(crate) fn is_active_vote_violation(error: &DieselError) -> bool {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => info
            .constraint_name()
            .map_or_else(|| info.message().contains(ACTIVE_VOTE_INDEX), |name| {
                name == ACTIVE_VOTE_INDEX
            }),
        _ => false,
    }
}
