//! Turns poll lifecycle events into "ending soon" and "ended" announcements
//! for the delivery side to pick up from the same channel.
//!
//! Only polls whose `Created` event was received are tracked. If the receiver
//! lags, the skipped `Created` events are lost and those polls get no
//! announcements from this process.

use crate::clock::Clock;
use crate::db::models::PollStatus;
use crate::engine::PollEngine;
use crate::error::PollError;
use crate::events::{PollCreated, PollEvent, publish};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Clone)]
pub struct DeadlineNotifier {
    engine: PollEngine,
    clock: Arc<dyn Clock>,
    ending_soon_lead: Duration,
    /// Polls with a pending deadline timer; `true` once their end is handled.
    tracked: Arc<Mutex<HashMap<Uuid, bool>>>,
}

impl DeadlineNotifier {
    pub fn new(engine: PollEngine, clock: Arc<dyn Clock>, ending_soon_lead: Duration) -> Self {
        Self {
            engine,
            clock,
            ending_soon_lead,
            tracked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribes before returning, so events published afterwards are seen.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut rx = self.engine.events().subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PollEvent::Created(created)) => {
                        self.tracked.lock().await.insert(created.poll_id, false);
                        let notifier = self.clone();
                        tokio::spawn(async move { notifier.track(created).await });
                    }
                    Ok(PollEvent::Closed { poll_id }) => self.announce_end(poll_id).await,
                    Ok(PollEvent::Deleted { poll_id }) => {
                        if let Some(done) = self.tracked.lock().await.get_mut(&poll_id) {
                            *done = true;
                        }
                    }
                    Ok(PollEvent::EndingSoon { .. } | PollEvent::Ended { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            skipped,
                            "deadline notifier lagged behind poll events, skipped polls will not be announced"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("deadline notifier stopped");
        })
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        if let Ok(wait) = (at - self.clock.now()).to_std() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn track(&self, created: PollCreated) {
        let soon_at = created.deadline - self.ending_soon_lead;
        if soon_at > self.clock.now() {
            self.sleep_until(soon_at).await;
            if self.still_active(created.poll_id).await {
                info!(poll_id = %created.poll_id, "poll ending soon");
                publish(
                    self.engine.events(),
                    PollEvent::EndingSoon {
                        poll_id: created.poll_id,
                        deadline: created.deadline,
                    },
                );
            }
        }

        self.sleep_until(created.deadline).await;
        self.announce_end(created.poll_id).await;
        self.tracked.lock().await.remove(&created.poll_id);
    }

    /// Polls still waiting on their deadline timer.
    pub async fn tracked_polls(&self) -> usize {
        self.tracked.lock().await.len()
    }

    async fn still_active(&self, poll_id: Uuid) -> bool {
        if self.tracked.lock().await.get(&poll_id) == Some(&true) {
            return false;
        }
        match self.engine.lifecycle.get_poll(poll_id).await {
            Ok((poll, _)) => self.engine.lifecycle.status(&poll) == PollStatus::Active,
            Err(_) => false,
        }
    }

    async fn announce_end(&self, poll_id: Uuid) {
        // Untracked polls are closed before this process saw them created.
        match self.tracked.lock().await.get_mut(&poll_id) {
            Some(done) if *done => return,
            Some(done) => *done = true,
            None => {}
        }

        match self.engine.compute_results(poll_id).await {
            Ok(results) => {
                info!(
                    %poll_id,
                    total_votes = results.total_votes,
                    has_winner = results.winner.is_some(),
                    "poll ended"
                );
                publish(self.engine.events(), PollEvent::Ended { poll_id, results });
            }
            Err(PollError::PollNotFound) => debug!(%poll_id, "ended poll was deleted"),
            Err(e) => error!(%poll_id, error = %e, "could not compute results for ended poll"),
        }
    }
}
