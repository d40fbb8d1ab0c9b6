//! Domain primitives, ports, and services for the vote ledger.
//!
//! Purpose: define the ledger's entities and invariants independently of
//! storage. Vote rows are written only by the ledger services; result store
//! counters and vote status transitions are written only by reconciliation.
//!
//! Public surface:
//! - PollId, OptionId, UserId, VoteId: UUID-backed identifiers.
//! - Poll, Vote, PollResult, PollStats: ledger entities and read models.
//! - VoteCommandService, VoteQueryService: vote ledger and stats services.
//! - VoteReconciler: reconciliation job.

pub mod ids;
pub mod poll;
pub mod poll_result;
pub mod ports;
pub mod reconciliation;
pub mod stats;
pub mod vote;
pub mod vote_error;
mod voting_service;

pub use self::ids::{IdValidationError, OptionId, PollId, UserId, VoteId};
pub use self::poll::{Poll, PollOption};
pub use self::poll_result::{PollResult, TallyDelta};
pub use self::reconciliation::{
    PollFailure, PollReconciliation, ReconciliationError, ReconciliationReport, VoteReconciler,
    VoteReconcilerConfig,
};
pub use self::stats::{OptionStats, PollStats};
pub use self::vote::{ParseVoteStatusError, Vote, VoteDraft, VoteStatus};
pub use self::vote_error::VoteError;
pub use self::voting_service::{VoteCommandService, VoteQueryService};
