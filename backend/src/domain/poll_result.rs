//! Result store rows and the per-poll delta applied by reconciliation.
//!
//! `PollResult::vote_count` is only ever adjusted by a signed delta, never
//! overwritten with a recomputed absolute value. [`TallyDelta`] derives that
//! delta from the ledger rows a single reconciliation unit claims.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OptionId, PollId, Vote};

/// Running counter for one `(poll, option)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub vote_count: i64,
    pub last_updated_at: DateTime<Utc>,
}

/// Net per-option counter adjustment for one poll.
///
/// Credits come from pending, undeleted votes and debits from valid,
/// soft-deleted votes. Options whose credits and debits cancel out are not
/// reported.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use poll_ledger::domain::{OptionId, PollId, TallyDelta, UserId, Vote, VoteDraft, VoteStatus};
///
/// let poll_id = PollId::random();
/// let option_a = OptionId::random();
/// let option_b = OptionId::random();
/// let draft = |option_id| VoteDraft {
///     poll_id,
///     option_id,
///     user_id: UserId::random(),
///     voter_ip: "192.0.2.1".to_owned(),
/// };
/// let credit = Vote::pending(draft(option_b), Utc::now());
/// let mut debit = Vote::pending(draft(option_a), Utc::now()).retracted(Utc::now());
/// debit.status = VoteStatus::Valid;
///
/// let delta = TallyDelta::from_batches(&[credit], &[debit]);
/// assert_eq!(delta.get(&option_a), -1);
/// assert_eq!(delta.get(&option_b), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyDelta {
    per_option: BTreeMap<OptionId, i64>,
}

impl TallyDelta {
    /// Derive the delta from a credit batch followed by a debit batch.
    pub fn from_batches(credited: &[Vote], debited: &[Vote]) -> Self {
        let mut delta = Self::default();
        for vote in credited {
            delta.credit(vote.option_id);
        }
        for vote in debited {
            delta.debit(vote.option_id);
        }
        delta
    }

    /// Count one additional vote for `option_id`.
    pub fn credit(&mut self, option_id: OptionId) {
        self.adjust(option_id, 1);
    }

    /// Retract one previously counted vote for `option_id`.
    pub fn debit(&mut self, option_id: OptionId) {
        self.adjust(option_id, -1);
    }

    fn adjust(&mut self, option_id: OptionId, by: i64) {
        let entry = self.per_option.entry(option_id).or_insert(0);
        *entry = entry.saturating_add(by);
        if *entry == 0 {
            self.per_option.remove(&option_id);
        }
    }

    /// Net adjustment for `option_id`; zero when untouched.
    pub fn get(&self, option_id: &OptionId) -> i64 {
        self.per_option.get(option_id).copied().unwrap_or(0)
    }

    /// Non-zero adjustments ordered by option id.
    pub fn entries(&self) -> impl Iterator<Item = (OptionId, i64)> + '_ {
        self.per_option.iter().map(|(option_id, delta)| (*option_id, *delta))
    }

    /// True when applying the delta would change nothing.
    pub fn is_empty(&self) -> bool {
        self.per_option.is_empty()
    }
}
