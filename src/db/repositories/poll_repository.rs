use crate::db::connection::DbPool;
use crate::db::models::{Candidate, Poll};
use crate::db::repositories::increment_template_usage;
use sqlx::{Error, Postgres};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

const POLL_COLUMNS: &str = "id, circle_id, creator_id, template_id, question_text, created_at, deadline, is_anonymous, manually_closed, deleted_at";

/// Poll row, candidate snapshot and template usage bump in one transaction.
pub async fn create_poll(pool: &DbPool, poll: &Poll, candidates: &[Candidate]) -> Result<(), Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO polls (id, circle_id, creator_id, template_id, question_text, created_at, deadline, is_anonymous, manually_closed) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(poll.id)
    .bind(poll.circle_id)
    .bind(poll.creator_id)
    .bind(poll.template_id)
    .bind(&poll.question_text)
    .bind(poll.created_at)
    .bind(poll.deadline)
    .bind(poll.is_anonymous)
    .bind(poll.manually_closed)
    .execute(&mut *tx)
    .await?;

    for candidate in candidates {
        sqlx::query(
            "INSERT INTO poll_candidates (id, poll_id, member_ref, display_name_snapshot, order_index, vote_count) VALUES ($1, $2, $3, $4, $5, 0)",
        )
        .bind(candidate.id)
        .bind(candidate.poll_id)
        .bind(candidate.member_ref)
        .bind(&candidate.display_name_snapshot)
        .bind(candidate.order_index)
        .execute(&mut *tx)
        .await?;
    }

    increment_template_usage(&mut *tx, poll.template_id).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_poll(pool: &DbPool, poll_id: Uuid) -> Result<Option<Poll>, Error> {
    let row = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(poll_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_circle_polls(pool: &DbPool, circle_id: Uuid) -> Result<Vec<Poll>, Error> {
    let rows = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {POLL_COLUMNS} FROM polls WHERE circle_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id ASC"
    ))
    .bind(circle_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get_poll_candidates<'e, E>(executor: E, poll_id: Uuid) -> Result<Vec<Candidate>, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, Candidate>(
        "SELECT id, poll_id, member_ref, display_name_snapshot, order_index, vote_count FROM poll_candidates WHERE poll_id = $1 ORDER BY order_index",
    )
    .bind(poll_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn close_poll(pool: &DbPool, poll_id: Uuid) -> Result<bool, Error> {
    let result = sqlx::query(
        "UPDATE polls SET manually_closed = TRUE WHERE id = $1 AND deleted_at IS NULL AND manually_closed = FALSE",
    )
    .bind(poll_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn soft_delete_poll(pool: &DbPool, poll_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error> {
    let result = sqlx::query("UPDATE polls SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
        .bind(poll_id)
        .bind(at)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
