use crate::db::connection::DbPool;
use crate::db::models::{Ballot, Candidate, Member, Poll, Template, TemplateFilter};
use crate::db::repositories;
use crate::db::store::{PollStore, Roster};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `PollStore` and `Roster` over the PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn list_templates(&self, filter: &TemplateFilter) -> StoreResult<(Vec<Template>, i64)> {
        Ok(repositories::list_templates(&self.pool, filter).await?)
    }

    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<Template>> {
        Ok(repositories::get_template(&self.pool, template_id).await?)
    }

    async fn insert_template(&self, template: &Template) -> StoreResult<()> {
        Ok(repositories::insert_template(&self.pool, template).await?)
    }

    async fn deactivate_template(&self, template_id: Uuid) -> StoreResult<bool> {
        Ok(repositories::deactivate_template(&self.pool, template_id).await?)
    }

    async fn increment_template_usage(&self, template_id: Uuid) -> StoreResult<()> {
        Ok(repositories::increment_template_usage(&self.pool, template_id).await?)
    }

    async fn create_poll(&self, poll: &Poll, candidates: &[Candidate]) -> StoreResult<()> {
        Ok(repositories::create_poll(&self.pool, poll, candidates).await?)
    }

    async fn get_poll(&self, poll_id: Uuid) -> StoreResult<Option<Poll>> {
        Ok(repositories::get_poll(&self.pool, poll_id).await?)
    }

    async fn list_circle_polls(&self, circle_id: Uuid) -> StoreResult<Vec<Poll>> {
        Ok(repositories::get_circle_polls(&self.pool, circle_id).await?)
    }

    async fn get_candidates(&self, poll_id: Uuid) -> StoreResult<Vec<Candidate>> {
        Ok(repositories::get_poll_candidates(&self.pool, poll_id).await?)
    }

    async fn mark_closed(&self, poll_id: Uuid) -> StoreResult<bool> {
        Ok(repositories::close_poll(&self.pool, poll_id).await?)
    }

    async fn soft_delete_poll(&self, poll_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(repositories::soft_delete_poll(&self.pool, poll_id, at).await?)
    }

    async fn find_ballot(&self, poll_id: Uuid, commitment: &str) -> StoreResult<Option<Ballot>> {
        Ok(repositories::find_ballot(&self.pool, poll_id, commitment).await?)
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> StoreResult<()> {
        repositories::insert_ballot(&self.pool, ballot)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => StoreError::Database(format!(
                    "candidate {} does not belong to poll {}",
                    ballot.candidate_ref, ballot.poll_id
                )),
                other => other.into(),
            })
    }

    async fn get_ballots(&self, poll_id: Uuid) -> StoreResult<Vec<Ballot>> {
        Ok(repositories::get_poll_ballots(&self.pool, poll_id).await?)
    }

    async fn tally_snapshot(&self, poll_id: Uuid) -> StoreResult<(Vec<Candidate>, Vec<Ballot>)> {
        Ok(repositories::get_tally_snapshot(&self.pool, poll_id).await?)
    }
}

#[async_trait]
impl Roster for PgStore {
    async fn is_active_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(repositories::is_active_member(&self.pool, circle_id, user_id).await?)
    }

    async fn active_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>> {
        Ok(repositories::get_active_members(&self.pool, circle_id).await?)
    }
}
