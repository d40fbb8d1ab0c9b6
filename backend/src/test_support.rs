//! Test doubles shared by unit tests (in `src/`) and integration tests (in
//! `tests/`).
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature.

mod clock;
mod in_memory_store;

pub use clock::MutableClock;
pub use in_memory_store::{InMemoryVoteStore, poll_with_options};
