//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Polls owned by the poll management collaborator.
    polls (id) {
        id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Selectable options of a poll, ordered by `position`.
    poll_options (id) {
        id -> Uuid,
        poll_id -> Uuid,
        text -> Text,
        position -> Int4,
    }
}

diesel::table! {
    /// Append-only vote ledger.
    ///
    /// The partial unique index `votes_one_active_per_user` allows at most one
    /// row with `deleted_at IS NULL` per `(poll_id, user_id)`.
    votes (id) {
        id -> Uuid,
        poll_id -> Uuid,
        option_id -> Uuid,
        user_id -> Uuid,
        voter_ip -> Text,
        created_at -> Timestamptz,
        /// Set when the vote is retracted or switched away from.
        deleted_at -> Nullable<Timestamptz>,
        /// One of `pending`, `valid`, `invalid`.
        status -> Text,
    }
}

diesel::table! {
    /// Running per-option counters written only by reconciliation.
    poll_results (poll_id, option_id) {
        poll_id -> Uuid,
        option_id -> Uuid,
        vote_count -> Int8,
        last_updated_at -> Timestamptz,
    }
}

diesel::joinable!(poll_options -> polls (poll_id));
diesel::joinable!(votes -> polls (poll_id));
diesel::joinable!(poll_results -> polls (poll_id));

diesel::allow_tables_to_appear_in_same_query!(polls, poll_options, votes, poll_results);
