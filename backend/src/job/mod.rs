//! Wiring for the `reconcile-votes` job.
//!
//! Builds the Diesel result store and the reconciler from
//! [`ReconcileJobSettings`] and runs either a single pass or a periodic
//! schedule.

use std::future::Future;
use std::sync::Arc;

use mockable::DefaultClock;
use tracing::info;

use crate::domain::ports::VoteSummarizer;
use crate::domain::reconciliation::run_periodically;
use crate::domain::{ReconciliationError, ReconciliationReport, VoteReconciler};
use crate::outbound::persistence::{DbPool, DieselPollResultRepository, PoolError};

pub mod config;

pub use config::{JobConfigError, JobMode, ReconcileJobSettings};

/// Errors raised while assembling the job.
#[derive(Debug, thiserror::Error)]
pub enum JobSetupError {
    #[error(transparent)]
    Config(#[from] JobConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// What a finished job run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A single pass completed without per-poll failures.
    Completed(ReconciliationReport),
    /// The periodic schedule stopped after this many passes.
    Stopped { passes: u64 },
}

/// A configured reconciliation job.
pub struct ReconcileJob<S: ?Sized> {
    summarizer: Arc<S>,
    mode: JobMode,
}

impl ReconcileJob<VoteReconciler<DieselPollResultRepository>> {
    /// Connect to PostgreSQL and build the reconciler from `settings`.
    pub async fn connect(settings: &ReconcileJobSettings) -> Result<Self, JobSetupError> {
        let database_url = settings.database_url()?;
        let reconciler_config = settings.reconciler_config()?;
        let pool = DbPool::new(settings.pool_config(&database_url)?).await?;
        info!(
            max_concurrent_polls = reconciler_config.max_concurrent_polls,
            run_deadline_secs = reconciler_config.run_deadline.as_secs(),
            "reconciliation job connected"
        );

        let reconciler = VoteReconciler::new(
            Arc::new(DieselPollResultRepository::new(pool)),
            Arc::new(DefaultClock),
            reconciler_config,
        );
        Ok(Self::new(Arc::new(reconciler), settings.mode()))
    }
}

impl<S> ReconcileJob<S>
where
    S: VoteSummarizer + ?Sized,
{
    /// Wrap an existing summarizer.
    pub fn new(summarizer: Arc<S>, mode: JobMode) -> Self {
        Self { summarizer, mode }
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    /// Run according to the configured mode.
    ///
    /// In single-pass mode any per-poll failure is returned as an error. In
    /// periodic mode failures are logged by the schedule and the run ends
    /// only when `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<JobOutcome, ReconciliationError>
    where
        F: Future<Output = ()>,
    {
        match self.mode {
            JobMode::Once => self
                .summarizer
                .summarize_all_votes()
                .await
                .map(JobOutcome::Completed),
            JobMode::Periodic(interval) => {
                let passes = run_periodically(self.summarizer.as_ref(), interval, shutdown).await;
                Ok(JobOutcome::Stopped { passes })
            }
        }
    }
}
