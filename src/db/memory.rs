//! In-process store with the same constraints as the PostgreSQL schema.

use crate::db::models::{Ballot, Candidate, Member, Poll, Template, TemplateFilter};
use crate::db::store::{PollStore, Roster};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    templates: HashMap<Uuid, Template>,
    polls: HashMap<Uuid, Poll>,
    candidates: HashMap<Uuid, Vec<Candidate>>,
    ballots: HashMap<Uuid, Vec<Ballot>>,
    circles: HashMap<Uuid, Vec<RosterEntry>>,
}

struct RosterEntry {
    member: Member,
    active: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or reactivates) a member; join time is taken from `joined_at`.
    pub async fn add_member(
        &self,
        circle_id: Uuid,
        user_id: Uuid,
        display_name: &str,
        joined_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        let roster = state.circles.entry(circle_id).or_default();
        if let Some(entry) = roster.iter_mut().find(|e| e.member.user_id == user_id) {
            entry.active = true;
            entry.member.display_name = display_name.to_string();
            return;
        }
        roster.push(RosterEntry {
            member: Member {
                user_id,
                display_name: display_name.to_string(),
                joined_at,
            },
            active: true,
        });
    }

    pub async fn rename_member(&self, circle_id: Uuid, user_id: Uuid, display_name: &str) -> bool {
        let mut state = self.state.lock().await;
        match state
            .circles
            .get_mut(&circle_id)
            .and_then(|r| r.iter_mut().find(|e| e.member.user_id == user_id))
        {
            Some(entry) => {
                entry.member.display_name = display_name.to_string();
                true
            }
            None => false,
        }
    }

    pub async fn deactivate_member(&self, circle_id: Uuid, user_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        match state
            .circles
            .get_mut(&circle_id)
            .and_then(|r| r.iter_mut().find(|e| e.member.user_id == user_id))
        {
            Some(entry) => {
                entry.active = false;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PollStore for InMemoryStore {
    async fn list_templates(&self, filter: &TemplateFilter) -> StoreResult<(Vec<Template>, i64)> {
        let state = self.state.lock().await;
        let mut matches: Vec<&Template> = state
            .templates
            .values()
            .filter(|t| t.is_active)
            .filter(|t| filter.category.as_ref().is_none_or(|c| &t.category == c))
            .filter(|t| filter.min_usage_exclusive.is_none_or(|min| t.usage_count > min))
            .collect();

        matches.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn get_template(&self, template_id: Uuid) -> StoreResult<Option<Template>> {
        Ok(self.state.lock().await.templates.get(&template_id).cloned())
    }

    async fn insert_template(&self, template: &Template) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.templates.contains_key(&template.id) {
            return Err(StoreError::Conflict("templates_pkey".to_string()));
        }
        if template.is_active
            && state
                .templates
                .values()
                .any(|t| t.is_active && t.text == template.text)
        {
            return Err(StoreError::Conflict("idx_templates_active_text".to_string()));
        }
        state.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn deactivate_template(&self, template_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.templates.get_mut(&template_id) {
            Some(t) if t.is_active => {
                t.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_template_usage(&self, template_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(t) = state.templates.get_mut(&template_id) {
            t.usage_count += 1;
        }
        Ok(())
    }

    async fn create_poll(&self, poll: &Poll, candidates: &[Candidate]) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        // Validate everything before touching state so a failure leaves nothing behind.
        if state.polls.contains_key(&poll.id) {
            return Err(StoreError::Conflict("polls_pkey".to_string()));
        }
        if !state.templates.contains_key(&poll.template_id) {
            return Err(StoreError::Database(format!(
                "template {} does not exist",
                poll.template_id
            )));
        }
        if let Some(stray) = candidates.iter().find(|c| c.poll_id != poll.id) {
            return Err(StoreError::Database(format!(
                "candidate {} does not belong to poll {}",
                stray.id, poll.id
            )));
        }

        let mut ordered = candidates.to_vec();
        ordered.sort_by_key(|c| c.order_index);

        state.polls.insert(poll.id, poll.clone());
        state.candidates.insert(poll.id, ordered);
        state.ballots.insert(poll.id, Vec::new());
        if let Some(t) = state.templates.get_mut(&poll.template_id) {
            t.usage_count += 1;
        }
        Ok(())
    }

    async fn get_poll(&self, poll_id: Uuid) -> StoreResult<Option<Poll>> {
        let state = self.state.lock().await;
        Ok(state
            .polls
            .get(&poll_id)
            .filter(|p| p.deleted_at.is_none())
            .cloned())
    }

    async fn list_circle_polls(&self, circle_id: Uuid) -> StoreResult<Vec<Poll>> {
        let state = self.state.lock().await;
        let mut polls: Vec<Poll> = state
            .polls
            .values()
            .filter(|p| p.circle_id == circle_id && p.deleted_at.is_none())
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(polls)
    }

    async fn get_candidates(&self, poll_id: Uuid) -> StoreResult<Vec<Candidate>> {
        let state = self.state.lock().await;
        Ok(state.candidates.get(&poll_id).cloned().unwrap_or_default())
    }

    async fn mark_closed(&self, poll_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.polls.get_mut(&poll_id) {
            Some(p) if p.deleted_at.is_none() && !p.manually_closed => {
                p.manually_closed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete_poll(&self, poll_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.polls.get_mut(&poll_id) {
            Some(p) if p.deleted_at.is_none() => {
                p.deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_ballot(&self, poll_id: Uuid, commitment: &str) -> StoreResult<Option<Ballot>> {
        let state = self.state.lock().await;
        Ok(state
            .ballots
            .get(&poll_id)
            .and_then(|b| b.iter().find(|b| b.voter_commitment_hash == commitment))
            .cloned())
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let MemoryState {
            ballots, candidates, ..
        } = &mut *state;

        let poll_ballots = ballots.entry(ballot.poll_id).or_default();
        if poll_ballots
            .iter()
            .any(|b| b.voter_commitment_hash == ballot.voter_commitment_hash)
        {
            return Err(StoreError::Conflict("ballots_poll_id_voter_commitment_key".to_string()));
        }

        let candidate = candidates
            .get_mut(&ballot.poll_id)
            .and_then(|c| c.iter_mut().find(|c| c.id == ballot.candidate_ref))
            .ok_or_else(|| {
                StoreError::Database(format!(
                    "candidate {} does not belong to poll {}",
                    ballot.candidate_ref, ballot.poll_id
                ))
            })?;

        candidate.vote_count += 1;
        poll_ballots.push(ballot.clone());
        Ok(())
    }

    async fn get_ballots(&self, poll_id: Uuid) -> StoreResult<Vec<Ballot>> {
        let state = self.state.lock().await;
        Ok(state.ballots.get(&poll_id).cloned().unwrap_or_default())
    }

    async fn tally_snapshot(&self, poll_id: Uuid) -> StoreResult<(Vec<Candidate>, Vec<Ballot>)> {
        let state = self.state.lock().await;
        Ok((
            state.candidates.get(&poll_id).cloned().unwrap_or_default(),
            state.ballots.get(&poll_id).cloned().unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl Roster for InMemoryStore {
    async fn is_active_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .circles
            .get(&circle_id)
            .is_some_and(|r| r.iter().any(|e| e.active && e.member.user_id == user_id)))
    }

    async fn active_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>> {
        let state = self.state.lock().await;
        let mut members: Vec<Member> = state
            .circles
            .get(&circle_id)
            .map(|r| {
                r.iter()
                    .filter(|e| e.active)
                    .map(|e| e.member.clone())
                    .collect()
            })
            .unwrap_or_default();
        // Stable sort keeps insertion order for identical join times.
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn template(text: &str, usage_count: i64, created_at: DateTime<Utc>) -> Template {
        Template {
            id: Uuid::new_v4(),
            category: "fun".to_string(),
            text: text.to_string(),
            emoji: None,
            usage_count,
            is_active: true,
            created_at,
        }
    }

    #[tokio::test]
    async fn duplicate_active_template_text_conflicts() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_template(&template("Best laugh?", 0, now)).await.unwrap();
        let err = store
            .insert_template(&template("Best laugh?", 0, now))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivated_template_text_can_be_reused() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let first = template("Best laugh?", 0, now);
        store.insert_template(&first).await.unwrap();
        assert!(store.deactivate_template(first.id).await.unwrap());
        store.insert_template(&template("Best laugh?", 0, now)).await.unwrap();
    }

    #[tokio::test]
    async fn templates_are_listed_by_usage_then_age() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let older = template("a", 5, now - Duration::days(2));
        let newer = template("b", 5, now - Duration::days(1));
        let popular = template("c", 50, now);
        for t in [&newer, &popular, &older] {
            store.insert_template(t).await.unwrap();
        }

        let filter = TemplateFilter {
            limit: 10,
            ..Default::default()
        };
        let (items, total) = store.list_templates(&filter).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<Uuid> = items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![popular.id, older.id, newer.id]);
    }

    #[tokio::test]
    async fn tally_snapshot_pairs_cached_counts_with_ballots() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let tmpl = template("Best laugh?", 0, now);
        store.insert_template(&tmpl).await.unwrap();

        let poll = Poll {
            id: Uuid::new_v4(),
            circle_id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            template_id: tmpl.id,
            question_text: tmpl.text.clone(),
            created_at: now,
            deadline: now + Duration::hours(1),
            is_anonymous: true,
            manually_closed: false,
            deleted_at: None,
        };
        let candidate = Candidate {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            member_ref: Uuid::new_v4(),
            display_name_snapshot: "Al".to_string(),
            order_index: 0,
            vote_count: 0,
        };
        store.create_poll(&poll, &[candidate.clone()]).await.unwrap();
        store
            .insert_ballot(&Ballot {
                id: Uuid::new_v4(),
                poll_id: poll.id,
                candidate_ref: candidate.id,
                voter_commitment_hash: "c0ffee".to_string(),
                cast_at: now,
            })
            .await
            .unwrap();

        let (candidates, ballots) = store.tally_snapshot(poll.id).await.unwrap();
        assert_eq!(ballots.len(), 1);
        assert_eq!(candidates[0].vote_count, 1);

        let (candidates, ballots) = store.tally_snapshot(Uuid::new_v4()).await.unwrap();
        assert!(candidates.is_empty() && ballots.is_empty());
    }

    #[tokio::test]
    async fn roster_lists_active_members_in_join_order() {
        let store = InMemoryStore::new();
        let circle = Uuid::new_v4();
        let now = Utc::now();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_member(circle, b, "Bo", now - Duration::days(1)).await;
        store.add_member(circle, a, "Al", now - Duration::days(3)).await;
        store.add_member(circle, c, "Cy", now).await;
        store.deactivate_member(circle, c).await;

        let members = store.active_members(circle).await.unwrap();
        let ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(!store.is_active_member(circle, c).await.unwrap());
    }
}
