//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`*Repository`) are implemented by outbound adapters. Driving
//! ports (`VoteCommand`, `VoteQuery`, `VoteSummarizer`) are implemented by the
//! domain services and consumed by whatever fronts the ledger.

mod macros;
pub(crate) use macros::define_port_error;

mod poll_repository;
mod poll_result_repository;
mod vote_command;
mod vote_query;
mod vote_repository;
mod vote_summarizer;

#[cfg(test)]
pub use poll_repository::MockPollRepository;
pub use poll_repository::{PollRepository, PollRepositoryError};
#[cfg(test)]
pub use poll_result_repository::MockPollResultRepository;
pub use poll_result_repository::{PollResultRepository, PollResultRepositoryError, ProcessedVotes};
pub use vote_command::{CastVoteRequest, CastVoteResponse, VoteCommand};
pub use vote_query::VoteQuery;
#[cfg(test)]
pub use vote_repository::MockVoteRepository;
pub use vote_repository::{CastVoteOutcome, VoteRepository, VoteRepositoryError};
#[cfg(test)]
pub use vote_summarizer::MockVoteSummarizer;
pub use vote_summarizer::VoteSummarizer;
