//! Strongly typed identifiers for polls, options, users, and votes.
//!
//! Each identifier wraps a UUID. They serialise as their canonical hyphenated
//! string form and parse back through [`std::str::FromStr`], rejecting empty or
//! padded input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned when parsing an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    Empty { kind: &'static str },
    Invalid { kind: &'static str },
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { kind } => write!(f, "{kind} must not be empty"),
            Self::Invalid { kind } => write!(f, "{kind} must be a valid UUID"),
        }
    }
}

impl std::error::Error for IdValidationError {}

fn parse_uuid(raw: &str, kind: &'static str) -> Result<Uuid, IdValidationError> {
    if raw.is_empty() {
        return Err(IdValidationError::Empty { kind });
    }
    if raw.trim() != raw {
        return Err(IdValidationError::Invalid { kind });
    }
    Uuid::parse_str(raw).map_err(|_| IdValidationError::Invalid { kind })
}

macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                parse_uuid(raw, $kind).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

define_uuid_id!(
    /// Identifier of a poll.
    PollId,
    "poll id"
);
define_uuid_id!(
    /// Identifier of one option belonging to a poll.
    OptionId,
    "option id"
);
define_uuid_id!(
    /// Identifier of the authenticated principal casting votes.
    UserId,
    "user id"
);
define_uuid_id!(
    /// Identifier of a single vote ledger row.
    VoteId,
    "vote id"
);
