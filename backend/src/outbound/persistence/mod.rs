//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of the ledger's driven ports
//! backed by PostgreSQL via Diesel with async support through `diesel-async`
//! and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories translate between Diesel rows and domain
//!   types. Ledger rules live in the domain services.
//! - **Internal models**: row structs (`models.rs`) and schema definitions
//!   (`schema.rs`) never leave this module.
//! - **Database-enforced invariants**: the single active vote per user is
//!   guarded by an advisory lock and a partial unique index; result counters
//!   are only ever incremented in place.
//!
//! # Example
//!
//! ```no_run
//! use poll_ledger::outbound::persistence::{
//!     DbPool, DieselPollResultRepository, DieselVoteRepository, PoolConfig,
//! };
//!
//! # async fn wire() -> Result<(), poll_ledger::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/votes")).await?;
//! let votes = DieselVoteRepository::new(pool.clone());
//! let results = DieselPollResultRepository::new(pool);
//! # let _ = (votes, results);
//! # Ok(())
//! # }
//! ```

mod advisory_lock;
mod diesel_error_mapping;
mod diesel_poll_repository;
mod diesel_poll_result_repository;
mod diesel_vote_repository;
mod models;
mod pool;
mod schema;

pub use diesel_poll_repository::DieselPollRepository;
pub use diesel_poll_result_repository::DieselPollResultRepository;
pub use diesel_vote_repository::DieselVoteRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
