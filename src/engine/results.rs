//! Tallies, percentages, shared ranks and winner selection.
//!
//! Counts always come from the ballot set. Equal counts share a rank and the
//! following rank skips ahead (3, 2, 2, 1 votes rank as 1, 2, 2, 4).

use crate::clock::Clock;
use crate::db::models::{Ballot, Candidate, PollStatus};
use crate::db::store::PollStore;
use crate::error::{PollError, PollResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub candidate_id: Uuid,
    pub member_ref: Uuid,
    pub display_name: String,
    pub vote_count: i64,
    pub percentage: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResults {
    pub poll_id: Uuid,
    pub question_text: String,
    pub status: PollStatus,
    pub total_votes: i64,
    pub rows: Vec<ResultRow>,
    pub winner: Option<ResultRow>,
}

fn round_percentage(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Basis points in integers; half rounds away from zero.
    let basis_points = (count * 20_000 + total) / (2 * total);
    basis_points as f64 / 100.0
}

/// Builds ranked rows for every candidate. A ballot naming a candidate
/// outside `candidates` is an integrity fault.
pub fn tally(candidates: &[Candidate], ballots: &[Ballot]) -> PollResult<(i64, Vec<ResultRow>)> {
    let mut counts: HashMap<Uuid, i64> = candidates.iter().map(|c| (c.id, 0)).collect();
    for ballot in ballots {
        match counts.get_mut(&ballot.candidate_ref) {
            Some(count) => *count += 1,
            None => {
                return Err(PollError::Integrity(format!(
                    "ballot {} references candidate {} outside poll {}",
                    ballot.id, ballot.candidate_ref, ballot.poll_id
                )));
            }
        }
    }

    let total_votes = ballots.len() as i64;

    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| c.order_index);
    // Stable: equal counts keep roster order.
    ordered.sort_by(|a, b| counts[&b.id].cmp(&counts[&a.id]));

    let mut rows: Vec<ResultRow> = Vec::with_capacity(ordered.len());
    for (position, candidate) in ordered.into_iter().enumerate() {
        let vote_count = counts[&candidate.id];
        let rank = match rows.last() {
            Some(prev) if prev.vote_count == vote_count => prev.rank,
            _ => position as u32 + 1,
        };
        rows.push(ResultRow {
            candidate_id: candidate.id,
            member_ref: candidate.member_ref,
            display_name: candidate.display_name_snapshot.clone(),
            vote_count,
            percentage: round_percentage(vote_count, total_votes),
            rank,
        });
    }

    Ok((total_votes, rows))
}

/// Strict leader only: no winner on a tie for first or with zero votes.
pub fn pick_winner(rows: &[ResultRow]) -> Option<ResultRow> {
    let first = rows.first()?;
    if first.vote_count == 0 {
        return None;
    }
    match rows.get(1) {
        Some(second) if second.vote_count >= first.vote_count => None,
        _ => Some(first.clone()),
    }
}

#[derive(Clone)]
pub struct ResultsAggregator {
    store: Arc<dyn PollStore>,
    clock: Arc<dyn Clock>,
}

impl ResultsAggregator {
    pub fn new(store: Arc<dyn PollStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Safe at any status, including before the first ballot.
    pub async fn compute_results(&self, poll_id: Uuid) -> PollResult<PollResults> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        let (candidates, ballots) = self.store.tally_snapshot(poll_id).await?;

        let (total_votes, rows) = tally(&candidates, &ballots)?;

        for row in &rows {
            let cached = candidates
                .iter()
                .find(|c| c.id == row.candidate_id)
                .map(|c| c.vote_count);
            if cached != Some(row.vote_count) {
                warn!(
                    %poll_id,
                    candidate_id = %row.candidate_id,
                    cached = ?cached,
                    counted = row.vote_count,
                    "cached vote count disagrees with ballots"
                );
            }
        }

        let winner = pick_winner(&rows);

        Ok(PollResults {
            poll_id,
            question_text: poll.question_text.clone(),
            status: poll.status_at(self.clock.now()),
            total_votes,
            rows,
            winner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn candidates(poll_id: Uuid, names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate {
                id: Uuid::new_v4(),
                poll_id,
                member_ref: Uuid::new_v4(),
                display_name_snapshot: name.to_string(),
                order_index: i as i32,
                vote_count: 0,
            })
            .collect()
    }

    fn ballots_for(poll_id: Uuid, picks: &[(&Candidate, usize)]) -> Vec<Ballot> {
        picks
            .iter()
            .flat_map(|(candidate, n)| {
                (0..*n).map(move |_| Ballot {
                    id: Uuid::new_v4(),
                    poll_id,
                    candidate_ref: candidate.id,
                    voter_commitment_hash: Uuid::new_v4().simple().to_string(),
                    cast_at: Utc::now(),
                })
            })
            .collect()
    }

    #[test]
    fn exact_halves_round_away_from_zero() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben"]);
        let ballots = ballots_for(poll_id, &[(&cands[0], 137), (&cands[1], 23)]);

        let (total, rows) = tally(&cands, &ballots).unwrap();
        assert_eq!(total, 160);
        assert_eq!(rows[0].percentage, 85.63);
        assert_eq!(rows[1].percentage, 14.38);

        assert_eq!(round_percentage(1, 8), 12.5);
        assert_eq!(round_percentage(1, 3), 33.33);
        assert_eq!(round_percentage(0, 0), 0.0);
    }

    #[test]
    fn two_to_one_gives_rounded_percentages_and_a_winner() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben"]);
        let ballots = ballots_for(poll_id, &[(&cands[0], 2), (&cands[1], 1)]);

        let (total, rows) = tally(&cands, &ballots).unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows[0].display_name, "Ana");
        assert_eq!(rows[0].vote_count, 2);
        assert_eq!(rows[0].percentage, 66.67);
        assert_eq!(rows[1].percentage, 33.33);
        assert_eq!((rows[0].rank, rows[1].rank), (1, 2));

        let winner = pick_winner(&rows).unwrap();
        assert_eq!(winner.candidate_id, cands[0].id);
    }

    #[test]
    fn tie_for_first_shares_rank_one_and_has_no_winner() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben"]);
        let ballots = ballots_for(poll_id, &[(&cands[0], 2), (&cands[1], 2)]);

        let (_, rows) = tally(&cands, &ballots).unwrap();
        assert!(rows.iter().all(|r| r.rank == 1));
        assert!(rows.iter().all(|r| r.percentage == 50.0));
        assert_eq!(pick_winner(&rows), None);
    }

    #[test]
    fn rank_after_a_tie_skips_ahead() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben", "Cid", "Dee"]);
        let ballots = ballots_for(
            poll_id,
            &[(&cands[0], 1), (&cands[1], 2), (&cands[2], 2), (&cands[3], 3)],
        );

        let (_, rows) = tally(&cands, &ballots).unwrap();
        let ranks: Vec<(String, u32)> = rows.iter().map(|r| (r.display_name.clone(), r.rank)).collect();
        assert_eq!(
            ranks,
            vec![
                ("Dee".to_string(), 1),
                ("Ben".to_string(), 2),
                ("Cid".to_string(), 2),
                ("Ana".to_string(), 4),
            ]
        );
        assert_eq!(pick_winner(&rows).unwrap().display_name, "Dee");
    }

    #[test]
    fn no_ballots_means_zero_rows_in_roster_order_and_no_winner() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben", "Cid"]);

        let (total, rows) = tally(&cands, &[]).unwrap();
        assert_eq!(total, 0);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.vote_count == 0 && r.percentage == 0.0 && r.rank == 1));
        assert_eq!(rows[0].display_name, "Ana");
        assert_eq!(pick_winner(&rows), None);
    }

    #[test]
    fn single_candidate_with_votes_wins() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Solo"]);
        let ballots = ballots_for(poll_id, &[(&cands[0], 1)]);

        let (_, rows) = tally(&cands, &ballots).unwrap();
        assert_eq!(rows[0].percentage, 100.0);
        assert!(pick_winner(&rows).is_some());
    }

    #[test]
    fn ballot_for_foreign_candidate_is_an_integrity_fault() {
        let poll_id = Uuid::new_v4();
        let cands = candidates(poll_id, &["Ana", "Ben"]);
        let stranger = candidates(Uuid::new_v4(), &["Zed"]);
        let ballots = ballots_for(poll_id, &[(&stranger[0], 1)]);

        assert!(matches!(tally(&cands, &ballots), Err(PollError::Integrity(_))));
    }

    proptest! {
        #[test]
        fn tally_conserves_votes(votes in prop::collection::vec(0usize..6, 1..8)) {
            let poll_id = Uuid::new_v4();
            let names: Vec<String> = (0..votes.len()).map(|i| format!("member-{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let cands = candidates(poll_id, &name_refs);
            let picks: Vec<(&Candidate, usize)> = cands.iter().zip(votes.iter().copied()).collect();
            let ballots = ballots_for(poll_id, &picks);

            let (total, rows) = tally(&cands, &ballots).unwrap();
            prop_assert_eq!(total, ballots.len() as i64);
            prop_assert_eq!(rows.iter().map(|r| r.vote_count).sum::<i64>(), total);
            prop_assert_eq!(rows.len(), cands.len());
        }

        #[test]
        fn ranks_follow_counts(votes in prop::collection::vec(0usize..5, 1..8)) {
            let poll_id = Uuid::new_v4();
            let names: Vec<String> = (0..votes.len()).map(|i| format!("member-{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let cands = candidates(poll_id, &name_refs);
            let picks: Vec<(&Candidate, usize)> = cands.iter().zip(votes.iter().copied()).collect();
            let ballots = ballots_for(poll_id, &picks);

            let (_, rows) = tally(&cands, &ballots).unwrap();
            prop_assert_eq!(rows[0].rank, 1);
            for pair in rows.windows(2) {
                prop_assert!(pair[0].vote_count >= pair[1].vote_count);
                if pair[0].vote_count == pair[1].vote_count {
                    prop_assert_eq!(pair[0].rank, pair[1].rank);
                } else {
                    prop_assert!(pair[1].rank > pair[0].rank);
                }
            }
            for (position, row) in rows.iter().enumerate() {
                let above = rows.iter().filter(|r| r.vote_count > row.vote_count).count();
                prop_assert_eq!(row.rank as usize, above + 1);
                prop_assert!(row.rank as usize <= position + 1);
            }
        }
    }
}
