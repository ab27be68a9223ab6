//! The poll engine: template registry, lifecycle manager, ballot box and
//! results aggregator wired over a shared store, roster and clock.

pub mod ballot_box;
pub mod lifecycle;
pub mod results;
pub mod templates;

use crate::clock::Clock;
use crate::config::PollSettings;
use crate::db::models::{Ballot, Candidate, Poll, PollStatus};
use crate::db::store::{PollStore, Roster};
use crate::error::{PollError, PollResult};
use crate::events::EventSender;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub use ballot_box::{BallotBox, voter_commitment};
pub use lifecycle::{DeadlineSpec, LifecycleManager, PollDuration};
pub use results::{PollResults, ResultRow, ResultsAggregator};
pub use templates::{TemplateQuery, TemplateRegistry};

/// A poll as one member sees it.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    #[serde(flatten)]
    pub poll: Poll,
    pub status: PollStatus,
    pub candidates: Vec<Candidate>,
    pub has_voted: bool,
}

#[derive(Clone)]
pub struct PollEngine {
    pub templates: TemplateRegistry,
    pub lifecycle: LifecycleManager,
    pub ballots: BallotBox,
    pub results: ResultsAggregator,
    roster: Arc<dyn Roster>,
    events: EventSender,
}

impl PollEngine {
    pub fn new(
        store: Arc<dyn PollStore>,
        roster: Arc<dyn Roster>,
        clock: Arc<dyn Clock>,
        settings: PollSettings,
        events: EventSender,
    ) -> Self {
        let templates =
            TemplateRegistry::new(store.clone(), clock.clone(), settings.popular_threshold);
        let ballots = BallotBox::new(
            store.clone(),
            roster.clone(),
            clock.clone(),
            &settings.commitment_pepper,
        );
        let results = ResultsAggregator::new(store.clone(), clock.clone());
        let lifecycle = LifecycleManager::new(
            store,
            roster.clone(),
            clock,
            templates.clone(),
            settings,
            events.clone(),
        );

        Self {
            templates,
            lifecycle,
            ballots,
            results,
            roster,
            events,
        }
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub async fn create_poll(
        &self,
        circle_id: Uuid,
        creator_id: Uuid,
        template_id: Uuid,
        deadline: DeadlineSpec,
    ) -> PollResult<Poll> {
        self.lifecycle
            .create_poll(circle_id, creator_id, template_id, deadline)
            .await
    }

    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        voter_id: Uuid,
        candidate_id: Uuid,
    ) -> PollResult<Ballot> {
        self.ballots.cast_vote(poll_id, voter_id, candidate_id).await
    }

    pub async fn compute_results(&self, poll_id: Uuid) -> PollResult<PollResults> {
        self.results.compute_results(poll_id).await
    }

    pub async fn close_poll(&self, poll_id: Uuid, actor_id: Uuid) -> PollResult<()> {
        self.lifecycle.close_poll(poll_id, actor_id).await
    }

    pub async fn delete_poll(&self, poll_id: Uuid, actor_id: Uuid) -> PollResult<()> {
        self.lifecycle.delete_poll(poll_id, actor_id).await
    }

    /// Only members of the poll's circle may look at it.
    pub async fn poll_view(&self, poll_id: Uuid, viewer_id: Uuid) -> PollResult<PollView> {
        let (poll, candidates) = self.lifecycle.get_poll(poll_id).await?;
        if !self.roster.is_active_member(poll.circle_id, viewer_id).await? {
            return Err(PollError::NotMember);
        }
        let has_voted = self.ballots.has_voted(poll_id, viewer_id).await?;
        let status = self.lifecycle.status(&poll);

        Ok(PollView {
            poll,
            status,
            candidates,
            has_voted,
        })
    }

    pub async fn results_for(&self, poll_id: Uuid, viewer_id: Uuid) -> PollResult<PollResults> {
        let (poll, _) = self.lifecycle.get_poll(poll_id).await?;
        if !self.roster.is_active_member(poll.circle_id, viewer_id).await? {
            return Err(PollError::NotMember);
        }
        self.compute_results(poll_id).await
    }
}
