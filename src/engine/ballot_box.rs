//! One anonymous ballot per voter per poll.
//!
//! Ballots carry a commitment instead of the voter id. The commitment is a
//! SHA-256 over the voter id, the poll id and a salt derived from the poll id
//! and the deployment pepper, so the same voter always maps to the same value
//! within a poll and to unrelated values across polls.

use crate::clock::Clock;
use crate::db::models::{Ballot, PollStatus};
use crate::db::store::{PollStore, Roster};
use crate::error::{PollError, PollResult, StoreError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const SALT_DOMAIN: &[u8] = b"ballot-salt";

fn poll_salt(poll_id: Uuid, pepper: &str) -> [u8; 32] {
    Sha256::new()
        .chain_update(SALT_DOMAIN)
        .chain_update(poll_id.as_bytes())
        .chain_update(pepper.as_bytes())
        .finalize()
        .into()
}

pub fn voter_commitment(voter_id: Uuid, poll_id: Uuid, pepper: &str) -> String {
    let digest = Sha256::new()
        .chain_update(voter_id.as_bytes())
        .chain_update(poll_id.as_bytes())
        .chain_update(poll_salt(poll_id, pepper))
        .finalize();
    hex::encode(digest)
}

#[derive(Clone)]
pub struct BallotBox {
    store: Arc<dyn PollStore>,
    roster: Arc<dyn Roster>,
    clock: Arc<dyn Clock>,
    pepper: Arc<str>,
}

impl BallotBox {
    pub fn new(
        store: Arc<dyn PollStore>,
        roster: Arc<dyn Roster>,
        clock: Arc<dyn Clock>,
        pepper: &str,
    ) -> Self {
        Self {
            store,
            roster,
            clock,
            pepper: Arc::from(pepper),
        }
    }

    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        voter_id: Uuid,
        candidate_id: Uuid,
    ) -> PollResult<Ballot> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        let candidates = self.store.get_candidates(poll_id).await?;
        let candidate = candidates.iter().find(|c| c.id == candidate_id);

        // Checked before status so a self-vote reads the same on any poll.
        if candidate_id == voter_id || candidate.is_some_and(|c| c.member_ref == voter_id) {
            return Err(PollError::SelfVote);
        }

        if poll.status_at(self.clock.now()) != PollStatus::Active {
            return Err(PollError::PollEnded);
        }

        if !self.roster.is_active_member(poll.circle_id, voter_id).await? {
            return Err(PollError::NotMember);
        }

        let candidate = candidate.ok_or(PollError::CandidateNotFound)?;

        let commitment = voter_commitment(voter_id, poll_id, &self.pepper);
        if self.store.find_ballot(poll_id, &commitment).await?.is_some() {
            debug!(%poll_id, "duplicate ballot rejected");
            return Err(PollError::AlreadyVoted);
        }

        let ballot = Ballot {
            id: Uuid::new_v4(),
            poll_id,
            candidate_ref: candidate.id,
            voter_commitment_hash: commitment,
            cast_at: self.clock.now(),
        };

        match self.store.insert_ballot(&ballot).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => self.retry_after_conflict(&ballot).await?,
            Err(e) => return Err(e.into()),
        }

        info!(%poll_id, ballot_id = %ballot.id, "ballot accepted");
        Ok(ballot)
    }

    /// A conflicting insert means another request got there first, or the
    /// store hiccupped. Look again once before deciding.
    async fn retry_after_conflict(&self, ballot: &Ballot) -> PollResult<()> {
        if self
            .store
            .find_ballot(ballot.poll_id, &ballot.voter_commitment_hash)
            .await?
            .is_some()
        {
            debug!(poll_id = %ballot.poll_id, "concurrent duplicate ballot rejected");
            return Err(PollError::AlreadyVoted);
        }

        self.store.insert_ballot(ballot).await.map_err(|e| match e {
            StoreError::Conflict(_) => PollError::AlreadyVoted,
            other => other.into(),
        })
    }

    pub async fn has_voted(&self, poll_id: Uuid, voter_id: Uuid) -> PollResult<bool> {
        let commitment = voter_commitment(voter_id, poll_id, &self.pepper);
        Ok(self.store.find_ballot(poll_id, &commitment).await?.is_some())
    }
}
