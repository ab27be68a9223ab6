//! Poll creation, manual close and soft delete.

use crate::clock::Clock;
use crate::config::PollSettings;
use crate::db::models::{Candidate, Poll, PollStatus};
use crate::db::store::{PollStore, Roster};
use crate::engine::templates::TemplateRegistry;
use crate::error::{PollError, PollResult};
use crate::events::{EventSender, PollCreated, PollEvent, publish};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollDuration {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "3h")]
    ThreeHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
}

impl PollDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            PollDuration::OneHour => Duration::hours(1),
            PollDuration::ThreeHours => Duration::hours(3),
            PollDuration::SixHours => Duration::hours(6),
            PollDuration::OneDay => Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineSpec {
    In(PollDuration),
    /// Only honoured when the deployment allows custom deadlines.
    At(DateTime<Utc>),
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn PollStore>,
    roster: Arc<dyn Roster>,
    clock: Arc<dyn Clock>,
    templates: TemplateRegistry,
    settings: PollSettings,
    events: EventSender,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn PollStore>,
        roster: Arc<dyn Roster>,
        clock: Arc<dyn Clock>,
        templates: TemplateRegistry,
        settings: PollSettings,
        events: EventSender,
    ) -> Self {
        Self {
            store,
            roster,
            clock,
            templates,
            settings,
            events,
        }
    }

    fn resolve_deadline(&self, spec: DeadlineSpec, now: DateTime<Utc>) -> PollResult<DateTime<Utc>> {
        let deadline = match spec {
            DeadlineSpec::In(duration) => now + duration.as_duration(),
            DeadlineSpec::At(at) => {
                if !self.settings.allow_custom_deadline
                    || at > now + Duration::hours(self.settings.max_custom_deadline_hours)
                {
                    return Err(PollError::InvalidDeadline);
                }
                at
            }
        };

        if deadline <= now {
            return Err(PollError::InvalidDeadline);
        }
        Ok(deadline)
    }

    pub async fn create_poll(
        &self,
        circle_id: Uuid,
        creator_id: Uuid,
        template_id: Uuid,
        deadline: DeadlineSpec,
    ) -> PollResult<Poll> {
        if !self.roster.is_active_member(circle_id, creator_id).await? {
            return Err(PollError::NotMember);
        }

        let template = self.templates.get(template_id).await?;

        let now = self.clock.now();
        let deadline = self.resolve_deadline(deadline, now)?;

        let poll_id = Uuid::new_v4();
        let candidates: Vec<Candidate> = self
            .roster
            .active_members(circle_id)
            .await?
            .into_iter()
            .filter(|m| m.user_id != creator_id)
            .enumerate()
            .map(|(index, member)| Candidate {
                id: Uuid::new_v4(),
                poll_id,
                member_ref: member.user_id,
                display_name_snapshot: member.display_name,
                order_index: index as i32,
                vote_count: 0,
            })
            .collect();

        if candidates.len() < self.settings.min_candidates {
            return Err(PollError::InsufficientRoster {
                required: self.settings.min_candidates,
                found: candidates.len(),
            });
        }

        let poll = Poll {
            id: poll_id,
            circle_id,
            creator_id,
            template_id: template.id,
            question_text: template.text,
            created_at: now,
            deadline,
            is_anonymous: true,
            manually_closed: false,
            deleted_at: None,
        };

        // Also bumps the template's usage count inside the same transaction.
        self.store.create_poll(&poll, &candidates).await?;

        info!(
            %poll_id,
            %circle_id,
            %template_id,
            candidates = candidates.len(),
            deadline = %deadline,
            "poll created"
        );

        publish(
            &self.events,
            PollEvent::Created(PollCreated {
                poll_id,
                circle_id,
                creator_id,
                deadline,
            }),
        );

        Ok(poll)
    }

    pub async fn close_poll(&self, poll_id: Uuid, actor_id: Uuid) -> PollResult<()> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        if poll.creator_id != actor_id {
            return Err(PollError::NotCreator);
        }

        if poll.status_at(self.clock.now()) != PollStatus::Active {
            return Err(PollError::AlreadyClosed);
        }

        // Conditional update; a concurrent close loses here.
        if !self.store.mark_closed(poll_id).await? {
            return Err(PollError::AlreadyClosed);
        }

        info!(%poll_id, "poll closed by creator");
        publish(&self.events, PollEvent::Closed { poll_id });
        Ok(())
    }

    pub async fn delete_poll(&self, poll_id: Uuid, actor_id: Uuid) -> PollResult<()> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        if poll.creator_id != actor_id {
            return Err(PollError::NotCreator);
        }

        let now = self.clock.now();
        if now - poll.created_at > Duration::hours(self.settings.delete_window_hours) {
            return Err(PollError::WindowExpired);
        }

        if !self.store.soft_delete_poll(poll_id, now).await? {
            return Err(PollError::PollNotFound);
        }

        info!(%poll_id, "poll deleted by creator");
        publish(&self.events, PollEvent::Deleted { poll_id });
        Ok(())
    }

    pub async fn get_poll(&self, poll_id: Uuid) -> PollResult<(Poll, Vec<Candidate>)> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;
        let candidates = self.store.get_candidates(poll_id).await?;
        Ok((poll, candidates))
    }

    pub async fn list_circle_polls(&self, circle_id: Uuid, viewer_id: Uuid) -> PollResult<Vec<Poll>> {
        if !self.roster.is_active_member(circle_id, viewer_id).await? {
            return Err(PollError::NotMember);
        }
        Ok(self.store.list_circle_polls(circle_id).await?)
    }

    pub fn status(&self, poll: &Poll) -> PollStatus {
        poll.status_at(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_map_to_hours() {
        assert_eq!(PollDuration::OneHour.as_duration(), Duration::hours(1));
        assert_eq!(PollDuration::ThreeHours.as_duration(), Duration::hours(3));
        assert_eq!(PollDuration::SixHours.as_duration(), Duration::hours(6));
        assert_eq!(PollDuration::OneDay.as_duration(), Duration::hours(24));
    }

    #[test]
    fn durations_use_short_wire_names() {
        let parsed: PollDuration = serde_json::from_str("\"6h\"").unwrap();
        assert_eq!(parsed, PollDuration::SixHours);
        assert_eq!(serde_json::to_string(&PollDuration::OneDay).unwrap(), "\"24h\"");
        assert!(serde_json::from_str::<PollDuration>("\"2h\"").is_err());
    }
}
