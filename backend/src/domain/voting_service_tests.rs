//! Tests for the vote ledger services.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    MockPollRepository, MockPollResultRepository, MockVoteRepository, PollResultRepositoryError,
};
use crate::domain::{OptionId, PollOption, PollResult, VoteDraft, VoteStatus};
use crate::test_support::MutableClock;

struct PollFixture {
    poll: Poll,
    option_a: OptionId,
    option_b: OptionId,
}

#[fixture]
fn poll_fixture() -> PollFixture {
    let poll_id = PollId::random();
    let option_a = OptionId::random();
    let option_b = OptionId::random();
    let poll = Poll {
        id: poll_id,
        title: "Best editor".to_owned(),
        description: None,
        options: vec![
            PollOption {
                id: option_a,
                poll_id,
                text: "vim".to_owned(),
            },
            PollOption {
                id: option_b,
                poll_id,
                text: "emacs".to_owned(),
            },
        ],
        created_at: fixed_now(),
        expires_at: None,
    };
    PollFixture {
        poll,
        option_a,
        option_b,
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid fixed timestamp")
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(MutableClock::new(fixed_now()))
}

fn request(poll_id: PollId, option_id: OptionId, user_id: UserId) -> CastVoteRequest {
    CastVoteRequest {
        poll_id,
        option_id,
        user_id,
        voter_ip: "203.0.113.9".to_owned(),
    }
}

fn poll_repo_returning(poll: Option<Poll>) -> MockPollRepository {
    let mut repo = MockPollRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(poll));
    repo
}

fn existing_vote(poll_id: PollId, option_id: OptionId, user_id: UserId) -> Vote {
    Vote::pending(
        VoteDraft {
            poll_id,
            option_id,
            user_id,
            voter_ip: "203.0.113.9".to_owned(),
        },
        fixed_now(),
    )
}

#[rstest]
#[tokio::test]
async fn vote_records_pending_row_stamped_by_clock(poll_fixture: PollFixture) {
    let PollFixture { poll, option_a, .. } = poll_fixture;
    let poll_id = poll.id;
    let user_id = UserId::random();

    let mut votes = MockVoteRepository::new();
    votes
        .expect_has_voted_on_option()
        .with(eq(poll_id), eq(user_id), eq(option_a))
        .times(1)
        .return_once(|_, _, _| Ok(false));
    votes
        .expect_cast_vote()
        .withf(|vote| vote.status == VoteStatus::Pending && vote.deleted_at.is_none())
        .times(1)
        .return_once(|_| Ok(CastVoteOutcome::Recorded));

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll))),
        Arc::new(votes),
        clock(),
    );
    let response = service
        .vote(request(poll_id, option_a, user_id))
        .await
        .expect("vote succeeds");

    assert_eq!(response.vote.option_id, option_a);
    assert_eq!(response.vote.created_at, fixed_now());
    assert!(response.switched_from.is_none());
}

#[rstest]
#[tokio::test]
async fn vote_reports_switched_option(poll_fixture: PollFixture) {
    let PollFixture {
        poll,
        option_a,
        option_b,
    } = poll_fixture;
    let poll_id = poll.id;
    let user_id = UserId::random();
    let previous = existing_vote(poll_id, option_a, user_id);

    let mut votes = MockVoteRepository::new();
    votes
        .expect_has_voted_on_option()
        .return_once(|_, _, _| Ok(false));
    votes.expect_cast_vote().times(1).return_once(move |_| {
        Ok(CastVoteOutcome::Switched {
            previous: Box::new(previous),
        })
    });

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll))),
        Arc::new(votes),
        clock(),
    );
    let response = service
        .vote(request(poll_id, option_b, user_id))
        .await
        .expect("switch succeeds");

    assert_eq!(response.switched_from, Some(option_a));
    assert_eq!(response.vote.option_id, option_b);
}

#[rstest]
#[tokio::test]
async fn vote_on_unknown_poll_fails_before_touching_ledger() {
    let poll_id = PollId::random();
    let mut votes = MockVoteRepository::new();
    votes.expect_has_voted_on_option().times(0);
    votes.expect_cast_vote().times(0);

    let service =
        VoteCommandService::new(Arc::new(poll_repo_returning(None)), Arc::new(votes), clock());
    let err = service
        .vote(request(poll_id, OptionId::random(), UserId::random()))
        .await
        .expect_err("unknown poll");

    assert_eq!(err, VoteError::PollNotFound { poll_id });
}

#[rstest]
#[tokio::test]
async fn vote_for_foreign_option_is_invalid(poll_fixture: PollFixture) {
    let poll_id = poll_fixture.poll.id;
    let foreign = OptionId::random();
    let mut votes = MockVoteRepository::new();
    votes.expect_cast_vote().times(0);

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        clock(),
    );
    let err = service
        .vote(request(poll_id, foreign, UserId::random()))
        .await
        .expect_err("foreign option");

    assert_eq!(
        err,
        VoteError::InvalidOption {
            poll_id,
            option_id: foreign
        }
    );
}

#[rstest]
#[tokio::test]
async fn repeated_vote_is_rejected_by_precheck(poll_fixture: PollFixture) {
    let poll_id = poll_fixture.poll.id;
    let mut votes = MockVoteRepository::new();
    votes
        .expect_has_voted_on_option()
        .return_once(|_, _, _| Ok(true));
    votes.expect_cast_vote().times(0);

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        clock(),
    );
    let err = service
        .vote(request(poll_id, poll_fixture.option_a, UserId::random()))
        .await
        .expect_err("duplicate");

    assert_eq!(err, VoteError::AlreadyVoted);
}

#[rstest]
#[case::authoritative_check(Ok(CastVoteOutcome::AlreadyVoted {
    existing: Box::new(existing_vote(PollId::random(), OptionId::random(), UserId::random())),
}))]
#[case::unique_index(Err(VoteRepositoryError::active_vote_conflict("votes_one_active_per_user")))]
#[tokio::test]
async fn concurrent_duplicate_maps_to_already_voted(
    poll_fixture: PollFixture,
    #[case] outcome: Result<CastVoteOutcome, VoteRepositoryError>,
) {
    let poll_id = poll_fixture.poll.id;
    let mut votes = MockVoteRepository::new();
    votes
        .expect_has_voted_on_option()
        .return_once(|_, _, _| Ok(false));
    votes.expect_cast_vote().return_once(move |_| outcome);

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        clock(),
    );
    let err = service
        .vote(request(poll_id, poll_fixture.option_a, UserId::random()))
        .await
        .expect_err("duplicate");

    assert_eq!(err, VoteError::AlreadyVoted);
}

#[rstest]
#[tokio::test]
async fn vote_maps_connection_error_to_unavailable(poll_fixture: PollFixture) {
    let poll_id = poll_fixture.poll.id;
    let mut votes = MockVoteRepository::new();
    votes
        .expect_has_voted_on_option()
        .return_once(|_, _, _| Err(VoteRepositoryError::connection("pool timed out")));

    let service = VoteCommandService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        clock(),
    );
    let err = service
        .vote(request(poll_id, poll_fixture.option_a, UserId::random()))
        .await
        .expect_err("connection failure");

    assert!(matches!(err, VoteError::Unavailable { .. }));
    assert!(err.to_string().contains("pool timed out"));
}

#[rstest]
#[tokio::test]
async fn unvote_soft_deletes_at_clock_time() {
    let poll_id = PollId::random();
    let user_id = UserId::random();
    let retracted = existing_vote(poll_id, OptionId::random(), user_id).retracted(fixed_now());

    let mut votes = MockVoteRepository::new();
    votes
        .expect_retract_vote()
        .with(eq(poll_id), eq(user_id), eq(fixed_now()))
        .times(1)
        .return_once(move |_, _, _| Ok(Some(retracted)));

    let service =
        VoteCommandService::new(Arc::new(MockPollRepository::new()), Arc::new(votes), clock());
    service
        .unvote(&poll_id, &user_id)
        .await
        .expect("unvote succeeds");
}

#[rstest]
#[tokio::test]
async fn unvote_without_active_vote_is_did_not_vote() {
    let mut votes = MockVoteRepository::new();
    votes
        .expect_retract_vote()
        .return_once(|_, _, _| Ok(None));

    let service =
        VoteCommandService::new(Arc::new(MockPollRepository::new()), Arc::new(votes), clock());
    let err = service
        .unvote(&PollId::random(), &UserId::random())
        .await
        .expect_err("nothing to retract");

    assert_eq!(err, VoteError::DidNotVote);
}

#[rstest]
#[tokio::test]
async fn get_user_vote_returns_not_found_signal() {
    let mut votes = MockVoteRepository::new();
    votes
        .expect_find_active_vote()
        .return_once(|_, _| Ok(None));

    let service = VoteQueryService::new(
        Arc::new(MockPollRepository::new()),
        Arc::new(votes),
        Arc::new(MockPollResultRepository::new()),
    );
    let err = service
        .get_user_vote(&PollId::random(), &UserId::random())
        .await
        .expect_err("no vote");

    assert_eq!(err, VoteError::VoteNotFound);
}

#[rstest]
#[tokio::test]
async fn stats_require_an_active_vote(poll_fixture: PollFixture) {
    let poll_id = poll_fixture.poll.id;
    let mut votes = MockVoteRepository::new();
    votes.expect_has_voted().return_once(|_, _| Ok(false));
    let mut results = MockPollResultRepository::new();
    results.expect_find_results().times(0);

    let service = VoteQueryService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        Arc::new(results),
    );
    let err = service
        .get_poll_option_stats(&poll_id, &UserId::random())
        .await
        .expect_err("not voted");

    assert_eq!(err, VoteError::UserNotVoted);
}

#[rstest]
#[tokio::test]
async fn stats_for_unknown_poll_are_not_found() {
    let poll_id = PollId::random();
    let mut votes = MockVoteRepository::new();
    votes.expect_has_voted().times(0);

    let service = VoteQueryService::new(
        Arc::new(poll_repo_returning(None)),
        Arc::new(votes),
        Arc::new(MockPollResultRepository::new()),
    );
    let err = service
        .get_poll_option_stats(&poll_id, &UserId::random())
        .await
        .expect_err("unknown poll");

    assert!(matches!(err, VoteError::PollNotFound { poll_id: missing } if missing == poll_id));
}

#[rstest]
#[tokio::test]
async fn stats_compute_percentages_from_results(poll_fixture: PollFixture) {
    let PollFixture {
        poll,
        option_a,
        option_b,
    } = poll_fixture;
    let poll_id = poll.id;
    let rows = vec![
        PollResult {
            poll_id,
            option_id: option_a,
            vote_count: 2,
            last_updated_at: fixed_now(),
        },
        PollResult {
            poll_id,
            option_id: option_b,
            vote_count: 1,
            last_updated_at: fixed_now(),
        },
    ];

    let mut votes = MockVoteRepository::new();
    votes.expect_has_voted().return_once(|_, _| Ok(true));
    let mut results = MockPollResultRepository::new();
    results
        .expect_find_results()
        .with(eq(poll_id))
        .return_once(move |_| Ok(rows));

    let service = VoteQueryService::new(
        Arc::new(poll_repo_returning(Some(poll))),
        Arc::new(votes),
        Arc::new(results),
    );
    let stats = service
        .get_poll_option_stats(&poll_id, &UserId::random())
        .await
        .expect("stats succeed");

    let a = stats.get(&option_a).expect("option a present");
    assert_eq!(a.vote_count, 2);
    assert!((a.percentage - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.total_votes(), 3);
}

#[rstest]
#[tokio::test]
async fn stats_map_result_store_query_error_to_internal(poll_fixture: PollFixture) {
    let poll_id = poll_fixture.poll.id;
    let mut votes = MockVoteRepository::new();
    votes.expect_has_voted().return_once(|_, _| Ok(true));
    let mut results = MockPollResultRepository::new();
    results
        .expect_find_results()
        .return_once(|_| Err(PollResultRepositoryError::query("relation missing")));

    let service = VoteQueryService::new(
        Arc::new(poll_repo_returning(Some(poll_fixture.poll))),
        Arc::new(votes),
        Arc::new(results),
    );
    let err = service
        .get_poll_option_stats(&poll_id, &UserId::random())
        .await
        .expect_err("query failure");

    assert!(matches!(err, VoteError::Internal { .. }));
}
