//! Reconciliation job configuration loaded via OrthoConfig.
//!
//! Values come from `RECONCILER_*` environment variables and configuration
//! files. The connection string falls back to `DATABASE_URL`.

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::VoteReconcilerConfig;
use crate::outbound::persistence::PoolConfig;

const DATABASE_URL_FALLBACK: &str = "DATABASE_URL";

/// Errors raised while resolving job settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobConfigError {
    #[error("database URL missing: set RECONCILER_DATABASE_URL, --database-url, or DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("{source_name} must not be empty")]
    EmptyDatabaseUrl { source_name: &'static str },
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error(
        "pool_max_size {pool_max_size} is below max_concurrent_polls {max_concurrent_polls}; \
         reconciliation units would queue for connections"
    )]
    PoolSmallerThanFanOut {
        pool_max_size: u32,
        max_concurrent_polls: usize,
    },
}

/// How the job schedules passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    /// Run one pass and exit.
    Once,
    /// Run a pass on every interval until shut down.
    Periodic(Duration),
}

/// Configuration values controlling the reconciliation job.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RECONCILER")]
pub struct ReconcileJobSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Polls reconciled concurrently within one pass.
    #[ortho_config(default = 8)]
    pub max_concurrent_polls: usize,
    /// Seconds bounding one pass, discovery included.
    #[ortho_config(default = 300)]
    pub run_deadline_secs: u64,
    /// Maximum pooled database connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Seconds between passes; unset or zero runs a single pass.
    pub interval_secs: Option<u64>,
}

impl ReconcileJobSettings {
    /// Resolve the connection string, preferring the configured value over
    /// `DATABASE_URL`.
    pub fn database_url(&self) -> Result<String, JobConfigError> {
        if let Some(value) = &self.database_url {
            return non_empty(value.clone(), "RECONCILER_DATABASE_URL");
        }
        let from_env =
            env::var(DATABASE_URL_FALLBACK).map_err(|_| JobConfigError::MissingDatabaseUrl)?;
        non_empty(from_env, DATABASE_URL_FALLBACK)
    }

    /// Fan-out and deadline bounds for the reconciler.
    pub fn reconciler_config(&self) -> Result<VoteReconcilerConfig, JobConfigError> {
        if self.max_concurrent_polls == 0 {
            return Err(JobConfigError::ZeroLimit {
                field: "max_concurrent_polls",
            });
        }
        Ok(VoteReconcilerConfig {
            max_concurrent_polls: self.max_concurrent_polls,
            run_deadline: Duration::from_secs(self.run_deadline_secs),
        })
    }

    /// Pool settings, rejected when the pool cannot serve every concurrent
    /// reconciliation unit.
    pub fn pool_config(&self, database_url: &str) -> Result<PoolConfig, JobConfigError> {
        if self.pool_max_size == 0 {
            return Err(JobConfigError::ZeroLimit {
                field: "pool_max_size",
            });
        }
        let config = PoolConfig::new(database_url)
            .with_max_size(self.pool_max_size);
        if !config.covers_fan_out(self.max_concurrent_polls) {
            return Err(JobConfigError::PoolSmallerThanFanOut {
                pool_max_size: self.pool_max_size,
                max_concurrent_polls: self.max_concurrent_polls,
            });
        }
        Ok(config)
    }

    /// Single pass unless a non-zero interval is configured.
    pub fn mode(&self) -> JobMode {
        match self.interval_secs {
            Some(secs) if secs > 0 => JobMode::Periodic(Duration::from_secs(secs)),
            _ => JobMode::Once,
        }
    }
}

fn non_empty(value: String, source_name: &'static str) -> Result<String, JobConfigError> {
    if value.trim().is_empty() {
        return Err(JobConfigError::EmptyDatabaseUrl { source_name });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    //! Unit tests for job configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const ALL_KEYS: [&str; 6] = [
        "RECONCILER_DATABASE_URL",
        "RECONCILER_MAX_CONCURRENT_POLLS",
        "RECONCILER_RUN_DEADLINE_SECS",
        "RECONCILER_POOL_MAX_SIZE",
        "RECONCILER_INTERVAL_SECS",
        "DATABASE_URL",
    ];

    fn load_from_empty_args() -> ReconcileJobSettings {
        ReconcileJobSettings::load_from_iter([OsString::from("reconcile-votes")])
            .expect("config should load")
    }

    fn cleared_env_with(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        ALL_KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| (*value).to_owned());
                (*key, value)
            })
            .collect()
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(cleared_env_with(&[]));

        let settings = load_from_empty_args();
        assert_eq!(settings.max_concurrent_polls, 8);
        assert_eq!(settings.run_deadline_secs, 300);
        assert_eq!(settings.pool_max_size, 10);
        assert_eq!(settings.mode(), JobMode::Once);
        assert_eq!(
            settings.database_url(),
            Err(JobConfigError::MissingDatabaseUrl)
        );
        assert_eq!(
            settings.reconciler_config(),
            Ok(VoteReconcilerConfig::default())
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(cleared_env_with(&[
            ("RECONCILER_DATABASE_URL", "postgres://job@db/votes"),
            ("RECONCILER_MAX_CONCURRENT_POLLS", "3"),
            ("RECONCILER_RUN_DEADLINE_SECS", "45"),
            ("RECONCILER_POOL_MAX_SIZE", "4"),
            ("RECONCILER_INTERVAL_SECS", "60"),
        ]));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url().as_deref(),
            Ok("postgres://job@db/votes")
        );
        let config = settings.reconciler_config().expect("valid limits");
        assert_eq!(config.max_concurrent_polls, 3);
        assert_eq!(config.run_deadline, Duration::from_secs(45));
        assert_eq!(settings.mode(), JobMode::Periodic(Duration::from_secs(60)));
        let pool = settings
            .pool_config("postgres://job@db/votes")
            .expect("valid pool size");
        assert_eq!(pool.max_size(), 4);
    }

    #[rstest]
    fn database_url_falls_back_to_generic_variable() {
        let _guard = lock_env(cleared_env_with(&[(
            "DATABASE_URL",
            "postgres://fallback/votes",
        )]));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url().as_deref(),
            Ok("postgres://fallback/votes")
        );
    }

    #[rstest]
    fn blank_database_url_is_rejected() {
        let _guard = lock_env(cleared_env_with(&[("DATABASE_URL", "   ")]));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url(),
            Err(JobConfigError::EmptyDatabaseUrl {
                source_name: "DATABASE_URL"
            })
        );
    }

    #[rstest]
    fn zero_interval_runs_once() {
        let _guard = lock_env(cleared_env_with(&[("RECONCILER_INTERVAL_SECS", "0")]));

        assert_eq!(load_from_empty_args().mode(), JobMode::Once);
    }

    #[rstest]
    fn zero_fan_out_is_rejected() {
        let _guard = lock_env(cleared_env_with(&[(
            "RECONCILER_MAX_CONCURRENT_POLLS",
            "0",
        )]));

        assert_eq!(
            load_from_empty_args().reconciler_config(),
            Err(JobConfigError::ZeroLimit {
                field: "max_concurrent_polls"
            })
        );
    }

    #[rstest]
    #[case("8", "8", true)]
    #[case("8", "12", true)]
    #[case("12", "8", false)]
    fn pool_must_cover_the_fan_out(
        #[case] fan_out: &str,
        #[case] pool_size: &str,
        #[case] accepted: bool,
    ) {
        let _guard = lock_env(cleared_env_with(&[
            ("RECONCILER_MAX_CONCURRENT_POLLS", fan_out),
            ("RECONCILER_POOL_MAX_SIZE", pool_size),
        ]));

        let result = load_from_empty_args().pool_config("postgres://db/votes");
        if accepted {
            let pool = result.expect("pool covers fan-out");
            assert!(pool.covers_fan_out(fan_out.parse().expect("numeric fan-out")));
        } else {
            assert_eq!(
                result,
                Err(JobConfigError::PoolSmallerThanFanOut {
                    pool_max_size: 8,
                    max_concurrent_polls: 12,
                })
            );
        }
    }
}
