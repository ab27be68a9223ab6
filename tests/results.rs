mod common;

use chrono::Duration;
use circlepoll::db::PollStore;
use circlepoll::db::models::PollStatus;
use common::Fixture;

#[tokio::test]
async fn empty_poll_has_zero_rows_and_no_winner() {
    let fx = Fixture::new(3).await;
    let poll_id = fx.create_poll().await;

    let results = fx.engine.compute_results(poll_id).await.unwrap();
    assert_eq!(results.total_votes, 0);
    assert_eq!(results.rows.len(), 3);
    assert!(results.rows.iter().all(|r| r.vote_count == 0 && r.percentage == 0.0));
    assert!(results.winner.is_none());
    assert_eq!(results.status, PollStatus::Active);
}

#[tokio::test]
async fn two_votes_to_one_picks_a_winner() {
    // Creator plus four: A and B are candidates, C, D and the creator vote.
    let fx = Fixture::new(4).await;
    let poll_id = fx.create_poll().await;
    let a = fx.candidate_for(poll_id, fx.members[0]).await;
    let b = fx.candidate_for(poll_id, fx.members[1]).await;

    fx.engine.cast_vote(poll_id, fx.creator, a).await.unwrap();
    fx.engine.cast_vote(poll_id, fx.members[2], a).await.unwrap();
    fx.engine.cast_vote(poll_id, fx.members[3], b).await.unwrap();

    let results = fx.engine.compute_results(poll_id).await.unwrap();
    assert_eq!(results.total_votes, 3);

    let row_a = results.rows.iter().find(|r| r.candidate_id == a).unwrap();
    let row_b = results.rows.iter().find(|r| r.candidate_id == b).unwrap();
    assert_eq!((row_a.vote_count, row_a.percentage, row_a.rank), (2, 66.67, 1));
    assert_eq!((row_b.vote_count, row_b.percentage, row_b.rank), (1, 33.33, 2));
    assert_eq!(results.winner.as_ref().map(|w| w.candidate_id), Some(a));
}

#[tokio::test]
async fn two_two_tie_has_no_winner_and_shared_rank() {
    let fx = Fixture::new(6).await;
    let poll_id = fx.create_poll().await;
    let a = fx.candidate_for(poll_id, fx.members[0]).await;
    let b = fx.candidate_for(poll_id, fx.members[1]).await;

    fx.engine.cast_vote(poll_id, fx.members[2], a).await.unwrap();
    fx.engine.cast_vote(poll_id, fx.members[3], a).await.unwrap();
    fx.engine.cast_vote(poll_id, fx.members[4], b).await.unwrap();
    fx.engine.cast_vote(poll_id, fx.members[5], b).await.unwrap();

    let results = fx.engine.compute_results(poll_id).await.unwrap();
    assert!(results.winner.is_none());
    let row_a = results.rows.iter().find(|r| r.candidate_id == a).unwrap();
    let row_b = results.rows.iter().find(|r| r.candidate_id == b).unwrap();
    assert_eq!(row_a.rank, 1);
    assert_eq!(row_b.rank, 1);
    assert_eq!(row_a.percentage, 50.0);
}

#[tokio::test]
async fn tallies_match_ballots_and_cached_counts_at_every_step() {
    let fx = Fixture::new(5).await;
    let poll_id = fx.create_poll().await;
    let targets = [fx.members[1], fx.members[2], fx.members[1], fx.members[0], fx.members[1]];
    let voters = [fx.members[0], fx.members[1], fx.members[3], fx.members[4], fx.creator];

    for (voter, target) in voters.into_iter().zip(targets) {
        let candidate = fx.candidate_for(poll_id, target).await;
        fx.engine.cast_vote(poll_id, voter, candidate).await.unwrap();

        let results = fx.engine.compute_results(poll_id).await.unwrap();
        let ballots = fx.store.get_ballots(poll_id).await.unwrap();
        let summed: i64 = results.rows.iter().map(|r| r.vote_count).sum();
        assert_eq!(summed, results.total_votes);
        assert_eq!(results.total_votes, ballots.len() as i64);

        let candidates = fx.store.get_candidates(poll_id).await.unwrap();
        for row in &results.rows {
            let cached = candidates.iter().find(|c| c.id == row.candidate_id).unwrap();
            assert_eq!(cached.vote_count, row.vote_count);
        }
    }
}

#[tokio::test]
async fn results_stay_readable_after_the_poll_ends() {
    let fx = Fixture::new(3).await;
    let poll_id = fx.create_poll().await;
    let a = fx.candidate_for(poll_id, fx.members[0]).await;
    fx.engine.cast_vote(poll_id, fx.members[1], a).await.unwrap();

    fx.clock.advance(Duration::hours(3));
    let results = fx.engine.compute_results(poll_id).await.unwrap();
    assert_eq!(results.status, PollStatus::Expired);
    assert_eq!(results.winner.map(|w| w.candidate_id), Some(a));
}

#[tokio::test]
async fn results_are_for_circle_members_only() {
    let fx = Fixture::new(3).await;
    let poll_id = fx.create_poll().await;

    assert!(fx.engine.results_for(poll_id, fx.members[0]).await.is_ok());
    let err = fx
        .engine
        .results_for(poll_id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, circlepoll::error::PollError::NotMember));
}
