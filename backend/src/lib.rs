//! Poll vote ledger library.
//!
//! The domain layer owns the vote ledger rules, the stats calculation, and
//! the reconciliation pass that folds ledger changes into per-option
//! counters. Outbound adapters persist everything in PostgreSQL, and the job
//! module wires the reconciler for the `reconcile-votes` binary.

pub mod domain;
pub mod job;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
