//! Transaction-scoped PostgreSQL advisory locks.
//!
//! Keys are folded from UUIDs into the single `bigint` key space. A collision
//! only serialises two unrelated transactions; it never changes results.

use diesel::QueryResult;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::{PollId, UserId};

const POLL_RECONCILIATION_SALT: u64 = 0x706f_6c6c_7265_636f;
const USER_VOTE_SALT: u64 = 0x7573_6572_766f_7465;

fn fold(id: &Uuid) -> u64 {
    let (high, low) = id.as_u64_pair();
    high ^ low
}

/// Key serialising reconciliation units for one poll.
pub(crate) fn poll_reconciliation_key(poll_id: &PollId) -> i64 {
    let folded = fold(poll_id.as_uuid()) ^ POLL_RECONCILIATION_SALT;
    i64::from_ne_bytes(folded.to_ne_bytes())
}

/// Key serialising vote writes for one `(poll, user)` pair.
pub(crate) fn user_vote_key(poll_id: &PollId, user_id: &UserId) -> i64 {
    let folded =
        fold(poll_id.as_uuid()).rotate_left(32) ^ fold(user_id.as_uuid()) ^ USER_VOTE_SALT;
    i64::from_ne_bytes(folded.to_ne_bytes())
}

/// Block until the advisory lock for `key` is held; released at commit or
/// rollback.
pub(crate) async fn lock_for_transaction(
    conn: &mut AsyncPgConnection,
    key: i64,
) -> QueryResult<()> {
    sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(key)
        .execute(conn)
        .await
        .map(|_| ())
}
