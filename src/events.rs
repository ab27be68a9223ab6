use crate::engine::results::PollResults;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct PollCreated {
    pub poll_id: Uuid,
    pub circle_id: Uuid,
    pub creator_id: Uuid,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Created(PollCreated),
    Closed { poll_id: Uuid },
    Deleted { poll_id: Uuid },
    EndingSoon { poll_id: Uuid, deadline: DateTime<Utc> },
    Ended { poll_id: Uuid, results: PollResults },
}

pub type EventSender = broadcast::Sender<PollEvent>;

pub fn create_event_channel() -> EventSender {
    broadcast::channel(100).0
}

/// Fire and forget; nobody listening is fine.
pub fn publish(tx: &EventSender, event: PollEvent) {
    if tx.send(event).is_err() {
        debug!("poll event dropped, no subscribers");
    }
}
