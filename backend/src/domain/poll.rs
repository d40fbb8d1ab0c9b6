//! Poll read model consumed by the vote ledger.
//!
//! Poll creation and listing live outside this crate; the ledger only needs a
//! poll's identity and its option set to validate incoming votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OptionId, PollId};

/// One selectable option of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub text: String,
}

/// A poll together with its option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Poll {
    /// Return true when `option_id` belongs to this poll.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use poll_ledger::domain::{OptionId, Poll, PollId, PollOption};
    ///
    /// let poll_id = PollId::random();
    /// let option_id = OptionId::random();
    /// let poll = Poll {
    ///     id: poll_id,
    ///     title: "Lunch".to_owned(),
    ///     description: None,
    ///     options: vec![PollOption { id: option_id, poll_id, text: "Soup".to_owned() }],
    ///     created_at: Utc::now(),
    ///     expires_at: None,
    /// };
    /// assert!(poll.has_option(&option_id));
    /// assert!(!poll.has_option(&OptionId::random()));
    /// ```
    pub fn has_option(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|option| option.id == *option_id)
    }

    /// Iterate the identifiers of every option in declaration order.
    pub fn option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.options.iter().map(|option| option.id)
    }
}
