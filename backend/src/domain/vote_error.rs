//! Outcomes returned by the vote ledger and stats driving ports.
//!
//! Validation outcomes (`InvalidOption`, `AlreadyVoted`, `DidNotVote`,
//! `UserNotVoted`) are expected results handed back untouched. Storage
//! failures are wrapped with context and never retried here.

use super::{OptionId, PollId};

/// Errors surfaced by [`crate::domain::ports::VoteCommand`] and
/// [`crate::domain::ports::VoteQuery`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("poll {poll_id} not found")]
    PollNotFound { poll_id: PollId },
    #[error("option {option_id} does not belong to poll {poll_id}")]
    InvalidOption {
        poll_id: PollId,
        option_id: OptionId,
    },
    #[error("already voted for this option")]
    AlreadyVoted,
    #[error("no active vote to retract")]
    DidNotVote,
    #[error("no active vote found")]
    VoteNotFound,
    #[error("results are only visible after voting")]
    UserNotVoted,
    #[error("vote store unavailable: {message}")]
    Unavailable { message: String },
    #[error("vote store error: {message}")]
    Internal { message: String },
}

impl VoteError {
    /// True for validation outcomes the caller caused; false for storage
    /// failures.
    pub const fn is_expected(&self) -> bool {
        !matches!(self, Self::Unavailable { .. } | Self::Internal { .. })
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
