//! Vote ledger rows and their reconciliation status.
//!
//! A [`Vote`] is appended once per successful vote attempt and never updated
//! in place by the ledger except to set `deleted_at`. Status transitions
//! belong to the reconciliation job:
//!
//! ```text
//! pending --(reconciled)--> valid --(soft deleted, reconciled)--> invalid
//! pending --(soft deleted)--> never counted, stays pending
//! ```
//!
//! For any `(poll_id, user_id)` at most one row has `deleted_at == None`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OptionId, PollId, UserId, VoteId};

/// Reconciliation state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    /// Written by the ledger, not yet reflected in the result store.
    Pending,
    /// Counted in the result store.
    Valid,
    /// Previously counted, since retracted and debited.
    Invalid,
}

impl VoteStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vote status: {0}")]
pub struct ParseVoteStatusError(pub String);

impl FromStr for VoteStatus {
    type Err = ParseVoteStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            other => Err(ParseVoteStatusError(other.to_owned())),
        }
    }
}

/// Input required to append a fresh pending vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteDraft {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
    pub voter_ip: String,
}

/// One row of the vote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
    pub voter_ip: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub status: VoteStatus,
}

impl Vote {
    /// Build a new pending, active vote stamped with `created_at`.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use poll_ledger::domain::{OptionId, PollId, UserId, Vote, VoteDraft, VoteStatus};
    ///
    /// let vote = Vote::pending(
    ///     VoteDraft {
    ///         poll_id: PollId::random(),
    ///         option_id: OptionId::random(),
    ///         user_id: UserId::random(),
    ///         voter_ip: "203.0.113.7".to_owned(),
    ///     },
    ///     Utc::now(),
    /// );
    /// assert_eq!(vote.status, VoteStatus::Pending);
    /// assert!(vote.is_active());
    /// ```
    pub fn pending(draft: VoteDraft, created_at: DateTime<Utc>) -> Self {
        let VoteDraft {
            poll_id,
            option_id,
            user_id,
            voter_ip,
        } = draft;
        Self {
            id: VoteId::random(),
            poll_id,
            option_id,
            user_id,
            voter_ip,
            created_at,
            deleted_at: None,
            status: VoteStatus::Pending,
        }
    }

    /// True while the vote has not been retracted or switched away from.
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// True when the reconciliation job still has to credit this vote.
    pub const fn awaits_credit(&self) -> bool {
        matches!(self.status, VoteStatus::Pending) && self.is_active()
    }

    /// True when the reconciliation job still has to debit this vote.
    pub const fn awaits_debit(&self) -> bool {
        matches!(self.status, VoteStatus::Valid) && !self.is_active()
    }

    /// Return a copy soft-deleted at `at`; status is left for reconciliation.
    #[must_use]
    pub fn retracted(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }
}
