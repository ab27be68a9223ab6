#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use circlepoll::clock::{Clock, ManualClock};
use circlepoll::config::PollSettings;
use circlepoll::db::InMemoryStore;
use circlepoll::db::models::Template;
use circlepoll::engine::{DeadlineSpec, PollDuration, PollEngine};
use circlepoll::events::{EventSender, create_event_channel};
use std::sync::Arc;
use uuid::Uuid;

pub struct Fixture {
    pub store: InMemoryStore,
    pub clock: ManualClock,
    pub engine: PollEngine,
    pub events: EventSender,
    pub circle: Uuid,
    pub creator: Uuid,
    /// Non-creator members in join order.
    pub members: Vec<Uuid>,
    pub template: Template,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
}

impl Fixture {
    /// Creator plus `others` members, all active, with one seeded template.
    pub async fn new(others: usize) -> Self {
        Self::with_settings(others, PollSettings::default()).await
    }

    pub async fn with_settings(others: usize, settings: PollSettings) -> Self {
        let store = InMemoryStore::new();
        let clock = ManualClock::new(start_time());
        let events = create_event_channel();
        let engine = PollEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            settings,
            events.clone(),
        );

        let circle = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let joined = start_time() - Duration::days(30);
        store.add_member(circle, creator, "Creator", joined).await;

        let mut members = Vec::new();
        for i in 0..others {
            let id = Uuid::new_v4();
            store
                .add_member(
                    circle,
                    id,
                    &format!("Member {i}"),
                    joined + Duration::hours(i as i64 + 1),
                )
                .await;
            members.push(id);
        }

        let template = engine
            .templates
            .seed("fun", "Who has the best laugh?", Some("😂"))
            .await
            .unwrap();

        Self {
            store,
            clock,
            engine,
            events,
            circle,
            creator,
            members,
            template,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_poll(&self) -> Uuid {
        self.engine
            .create_poll(
                self.circle,
                self.creator,
                self.template.id,
                DeadlineSpec::In(PollDuration::OneHour),
            )
            .await
            .unwrap()
            .id
    }

    /// Candidate id for the given member in `poll_id`.
    pub async fn candidate_for(&self, poll_id: Uuid, member: Uuid) -> Uuid {
        let (_, candidates) = self.engine.lifecycle.get_poll(poll_id).await.unwrap();
        candidates
            .into_iter()
            .find(|c| c.member_ref == member)
            .map(|c| c.id)
            .unwrap()
    }
}
