//! Read-side percentage statistics derived from result store counters.
//!
//! Stats are computed at query time and never stored. They are consistent
//! with the last reconciliation pass, so they may lag ledger writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{OptionId, PollId, PollResult};

/// Count and share of one option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionStats {
    pub vote_count: i64,
    pub percentage: f64,
}

/// Per-option stats for one poll, keyed by option id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollStats {
    options: BTreeMap<OptionId, OptionStats>,
}

impl PollStats {
    /// Turn result rows into counts and percentages.
    ///
    /// Negative counters are clamped to zero and logged; they never
    /// contribute to the total. Options without a result row are absent.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use poll_ledger::domain::{OptionId, PollId, PollResult, PollStats};
    ///
    /// let poll_id = PollId::random();
    /// let (a, b) = (OptionId::random(), OptionId::random());
    /// let row = |option_id, vote_count| PollResult {
    ///     poll_id,
    ///     option_id,
    ///     vote_count,
    ///     last_updated_at: Utc::now(),
    /// };
    /// let stats = PollStats::from_results(&poll_id, &[row(a, 3), row(b, 1)]);
    /// assert_eq!(stats.get(&a).map(|s| s.percentage), Some(75.0));
    /// assert_eq!(stats.total_votes(), 4);
    /// ```
    pub fn from_results(poll_id: &PollId, results: &[PollResult]) -> Self {
        let counts: Vec<(OptionId, i64)> = results
            .iter()
            .map(|result| {
                if result.vote_count < 0 {
                    warn!(
                        poll_id = %poll_id,
                        option_id = %result.option_id,
                        vote_count = result.vote_count,
                        "negative vote counter clamped to zero"
                    );
                }
                (result.option_id, result.vote_count.max(0))
            })
            .collect();

        let total: i64 = counts.iter().map(|(_, count)| *count).sum();
        let options = counts
            .into_iter()
            .map(|(option_id, vote_count)| {
                let percentage = if total > 0 {
                    vote_count as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                (
                    option_id,
                    OptionStats {
                        vote_count,
                        percentage,
                    },
                )
            })
            .collect();

        Self { options }
    }

    /// Stats for a single option, if it has a result row.
    pub fn get(&self, option_id: &OptionId) -> Option<&OptionStats> {
        self.options.get(option_id)
    }

    /// Sum of clamped counts across all options.
    pub fn total_votes(&self) -> i64 {
        self.options.values().map(|stats| stats.vote_count).sum()
    }

    /// Iterate option stats ordered by option id.
    pub fn iter(&self) -> impl Iterator<Item = (&OptionId, &OptionStats)> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
