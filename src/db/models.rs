use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub id: Uuid,
    pub category: String,
    pub text: String,
    pub emoji: Option<String>,
    pub usage_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Active,
    Closed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub circle_id: Uuid,
    pub creator_id: Uuid,
    pub template_id: Uuid,
    pub question_text: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub is_anonymous: bool,
    pub manually_closed: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Poll {
    /// Closed wins over expired; a poll is active only before its deadline.
    pub fn status_at(&self, now: DateTime<Utc>) -> PollStatus {
        if self.manually_closed {
            PollStatus::Closed
        } else if now >= self.deadline {
            PollStatus::Expired
        } else {
            PollStatus::Active
        }
    }
}

/// A circle member frozen into a poll at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub member_ref: Uuid,
    pub display_name_snapshot: String,
    pub order_index: i32,
    /// Cached tally, bumped in the same transaction as each ballot insert.
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ballot {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub candidate_ref: Uuid,
    pub voter_commitment_hash: String,
    pub cast_at: DateTime<Utc>,
}

/// Roster entry as reported by the membership collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Uuid,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub category: Option<String>,
    /// When set, only templates whose usage count exceeds this value.
    pub min_usage_exclusive: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}
