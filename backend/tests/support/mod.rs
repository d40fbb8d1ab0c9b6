//! Shared PostgreSQL helpers for the Diesel adapter suites.
//!
//! Suites connect to the cluster named by `TEST_DATABASE_URL` when it is set
//! and otherwise boot the shared embedded cluster from
//! `pg-embed-setup-unpriv`. Embedded Diesel migrations run once per process,
//! and polls are seeded with plain SQL since poll authoring lives outside
//! this crate. Every test works on freshly generated poll ids, so suites can
//! share one database.
//!
//! Any setup failure, a missing cluster included, fails the test unless
//! `SKIP_TEST_CLUSTER` is truthy.

use std::sync::{Mutex, OnceLock};

use diesel::pg::PgConnection;
use diesel::sql_types::{Integer, Nullable, Text, Timestamptz, Uuid as SqlUuid};
use diesel::{Connection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pg_embedded_setup_unpriv::test_support::shared_cluster_handle;
use poll_ledger::domain::Poll;

/// Embedded migrations from the backend/migrations directory.
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database created inside the embedded cluster for the ledger suites.
const EMBEDDED_DATABASE: &str = "poll_ledger_tests";

static PREPARED: OnceLock<Mutex<Option<String>>> = OnceLock::new();

/// Returns true when the `SKIP_TEST_CLUSTER` environment variable is set to a
/// truthy value.
///
/// Truthy values: "1", "true", "yes" (case-insensitive).
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Handles cluster setup failures consistently across integration tests.
///
/// When `SKIP_TEST_CLUSTER` is truthy, prints a skip marker and returns `None`.
/// Otherwise, panics with a clear failure message so CI breakage is not masked.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    skip_or_fail(reason, should_skip_test_cluster())
}

fn skip_or_fail<T>(reason: impl std::fmt::Display, skip: bool) -> Option<T> {
    if skip {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// Where the suites find PostgreSQL.
#[derive(Debug, PartialEq, Eq)]
enum ClusterSource {
    External(String),
    Embedded,
}

fn cluster_source(test_database_url: Option<String>) -> ClusterSource {
    match test_database_url {
        Some(url) if !url.trim().is_empty() => ClusterSource::External(url),
        _ => ClusterSource::Embedded,
    }
}

fn embedded_database_url() -> Result<String, String> {
    let cluster = shared_cluster_handle()
        .map_err(|err| format!("embedded cluster: {err}"))?;
    let exists = cluster
        .database_exists(EMBEDDED_DATABASE)
        .map_err(|err| format!("database check: {err:?}"))?;
    if !exists {
        cluster
            .create_database(EMBEDDED_DATABASE)
            .map_err(|err| format!("create database: {err:?}"))?;
    }
    Ok(cluster.connection().database_url(EMBEDDED_DATABASE))
}

fn resolve_database_url() -> Result<String, String> {
    let url = match cluster_source(std::env::var("TEST_DATABASE_URL").ok()) {
        ClusterSource::External(url) => url,
        ClusterSource::Embedded => embedded_database_url()?,
    };
    migrate_schema(&url)?;
    Ok(url)
}

/// Resolve and migrate the test database, once per process.
///
/// Returns `None` only when setup failed and `SKIP_TEST_CLUSTER` allows
/// skipping.
pub fn prepared_database_url() -> Option<String> {
    let mut prepared = PREPARED
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|err| err.into_inner());
    if let Some(url) = prepared.as_ref() {
        return Some(url.clone());
    }
    // The embedded bootstrap blocks on its own runtime, so keep it off the
    // calling test's runtime thread.
    let resolved = std::thread::spawn(resolve_database_url)
        .join()
        .unwrap_or_else(|_| Err("cluster bootstrap panicked".to_owned()));
    match resolved {
        Ok(url) => {
            *prepared = Some(url.clone());
            Some(url)
        }
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

/// Runs all pending Diesel migrations.
fn migrate_schema(url: &str) -> Result<(), String> {
    let mut conn = PgConnection::establish(url).map_err(|err| format!("connect: {err}"))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| format!("migration: {err}"))?;
    Ok(())
}

/// Insert `poll` and its options, preserving option order as `position`.
pub fn seed_poll(url: &str, poll: &Poll) -> Result<(), String> {
    let mut conn = PgConnection::establish(url).map_err(|err| format!("connect: {err}"))?;
    diesel::sql_query(
        "INSERT INTO polls (id, title, description, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind::<SqlUuid, _>(*poll.id.as_uuid())
    .bind::<Text, _>(&poll.title)
    .bind::<Nullable<Text>, _>(poll.description.as_deref())
    .bind::<Timestamptz, _>(poll.created_at)
    .bind::<Nullable<Timestamptz>, _>(poll.expires_at)
    .execute(&mut conn)
    .map_err(|err| format!("seed poll: {err}"))?;

    for (position, option) in poll.options.iter().enumerate() {
        let position = i32::try_from(position).map_err(|err| err.to_string())?;
        diesel::sql_query(
            "INSERT INTO poll_options (id, poll_id, text, position) VALUES ($1, $2, $3, $4)",
        )
        .bind::<SqlUuid, _>(*option.id.as_uuid())
        .bind::<SqlUuid, _>(*poll.id.as_uuid())
        .bind::<Text, _>(&option.text)
        .bind::<Integer, _>(position)
        .execute(&mut conn)
        .map_err(|err| format!("seed option: {err}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    //! Skip policy for suites without a usable cluster.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, ClusterSource::Embedded)]
    #[case(Some("  "), ClusterSource::Embedded)]
    #[case(
        Some("postgres://ledger@db/votes"),
        ClusterSource::External("postgres://ledger@db/votes".to_owned())
    )]
    fn configured_url_wins_over_embedded_cluster(
        #[case] configured: Option<&str>,
        #[case] expected: ClusterSource,
    ) {
        assert_eq!(cluster_source(configured.map(str::to_owned)), expected);
    }

    #[rstest]
    fn setup_failure_skips_only_when_allowed() {
        let skipped: Option<String> = skip_or_fail("cluster unavailable", true);
        assert!(skipped.is_none());
    }

    #[rstest]
    #[should_panic(expected = "Test cluster setup failed: cluster unavailable")]
    fn setup_failure_fails_the_suite_by_default() {
        let _: Option<String> = skip_or_fail("cluster unavailable", false);
    }
}
