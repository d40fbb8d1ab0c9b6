//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    OptionId, ParseVoteStatusError, Poll, PollId, PollOption, PollResult, UserId, Vote, VoteId,
};

use super::schema::{poll_options, poll_results, polls, votes};

// ---------------------------------------------------------------------------
// Poll models
// ---------------------------------------------------------------------------

/// Row struct for reading from the polls table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = polls)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PollRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row struct for reading from the poll_options table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = poll_options)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PollOptionRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub text: String,
}

impl PollRow {
    /// Assemble the domain poll from its row and option rows.
    pub fn into_domain(self, options: Vec<PollOptionRow>) -> Poll {
        Poll {
            id: PollId::from_uuid(self.id),
            title: self.title,
            description: self.description,
            options: options
                .into_iter()
                .map(|option| PollOption {
                    id: OptionId::from_uuid(option.id),
                    poll_id: PollId::from_uuid(option.poll_id),
                    text: option.text,
                })
                .collect(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Vote ledger models
// ---------------------------------------------------------------------------

/// Row struct for reading from the votes table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VoteRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub voter_ip: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl TryFrom<VoteRow> for Vote {
    type Error = ParseVoteStatusError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: VoteId::from_uuid(row.id),
            poll_id: PollId::from_uuid(row.poll_id),
            option_id: OptionId::from_uuid(row.option_id),
            user_id: UserId::from_uuid(row.user_id),
            voter_ip: row.voter_ip,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
            status: row.status.parse()?,
        })
    }
}

/// Insertable struct for appending ledger rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = votes)]
pub(crate) struct NewVoteRow<'a> {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub voter_ip: &'a str,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub status: &'static str,
}

impl<'a> From<&'a Vote> for NewVoteRow<'a> {
    fn from(vote: &'a Vote) -> Self {
        Self {
            id: *vote.id.as_uuid(),
            poll_id: *vote.poll_id.as_uuid(),
            option_id: *vote.option_id.as_uuid(),
            user_id: *vote.user_id.as_uuid(),
            voter_ip: vote.voter_ip.as_str(),
            created_at: vote.created_at,
            deleted_at: vote.deleted_at,
            status: vote.status.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result store models
// ---------------------------------------------------------------------------

/// Row struct for reading from the poll_results table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = poll_results)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PollResultRow {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub vote_count: i64,
    pub last_updated_at: DateTime<Utc>,
}

impl From<PollResultRow> for PollResult {
    fn from(row: PollResultRow) -> Self {
        Self {
            poll_id: PollId::from_uuid(row.poll_id),
            option_id: OptionId::from_uuid(row.option_id),
            vote_count: row.vote_count,
            last_updated_at: row.last_updated_at,
        }
    }
}

/// Insertable struct carrying a signed delta for the upsert-increment.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = poll_results)]
pub(crate) struct PollResultDeltaRow {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub vote_count: i64,
    pub last_updated_at: DateTime<Utc>,
}
