//! Persistence seams used by the poll engine.
//!
//! `PgStore` backs these with PostgreSQL; `InMemoryStore` keeps everything in
//! process and is what the tests drive.

use crate::db::models::{Ballot, Candidate, Member, Poll, Template, TemplateFilter};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Active templates matching `filter`, ordered by usage desc, creation
    /// time, id. The total counts every match, ignoring limit/offset.
    async fn list_templates(&self, filter: &TemplateFilter) -> StoreResult<(Vec<Template>, i64)>;

    /// Any template, active or not.
    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<Template>>;

    /// Fails with `Conflict` if another active template has the same text.
    async fn insert_template(&self, template: &Template) -> StoreResult<()>;

    async fn deactivate_template(&self, template_id: Uuid) -> StoreResult<bool>;

    async fn increment_template_usage(&self, template_id: Uuid) -> StoreResult<()>;

    /// Writes the poll, all of its candidates and the template usage bump as
    /// one unit. Nothing is visible if any part fails.
    async fn create_poll(&self, poll: &Poll, candidates: &[Candidate]) -> StoreResult<()>;

    /// Soft-deleted polls are reported as absent.
    async fn get_poll(&self, poll_id: Uuid) -> StoreResult<Option<Poll>>;

    /// Newest first, soft-deleted polls excluded.
    async fn list_circle_polls(&self, circle_id: Uuid) -> StoreResult<Vec<Poll>>;

    /// Ordered by `order_index`.
    async fn get_candidates(&self, poll_id: Uuid) -> StoreResult<Vec<Candidate>>;

    /// Sets `manually_closed`; returns false if it was already set.
    async fn mark_closed(&self, poll_id: Uuid) -> StoreResult<bool>;

    async fn soft_delete_poll(&self, poll_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn find_ballot(&self, poll_id: Uuid, commitment: &str) -> StoreResult<Option<Ballot>>;

    /// Inserts the ballot and bumps the candidate's cached count atomically.
    /// A second ballot with the same `(poll_id, commitment)` fails with
    /// `Conflict`.
    async fn insert_ballot(&self, ballot: &Ballot) -> StoreResult<()>;

    async fn get_ballots(&self, poll_id: Uuid) -> StoreResult<Vec<Ballot>>;

    /// Candidates and ballots read from one consistent view, so cached
    /// counts match the ballot set unless the data itself has drifted.
    async fn tally_snapshot(&self, poll_id: Uuid) -> StoreResult<(Vec<Candidate>, Vec<Ballot>)>;
}

/// Read side of the membership collaborator.
#[async_trait]
pub trait Roster: Send + Sync {
    async fn is_active_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Active members in join order.
    async fn active_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>>;
}
