use crate::db::connection::DbPool;
use crate::db::models::Member;
use sqlx::{Error, Row};
use uuid::Uuid;

pub async fn is_active_member(pool: &DbPool, circle_id: Uuid, user_id: Uuid) -> Result<bool, Error> {
    let row = sqlx::query(
        "SELECT 1 AS present FROM circle_members WHERE circle_id = $1 AND user_id = $2 AND is_active",
    )
    .bind(circle_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

pub async fn get_active_members(pool: &DbPool, circle_id: Uuid) -> Result<Vec<Member>, Error> {
    let rows = sqlx::query(
        "SELECT user_id, display_name, joined_at FROM circle_members WHERE circle_id = $1 AND is_active ORDER BY joined_at, user_id",
    )
    .bind(circle_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Member {
            user_id: r.get("user_id"),
            display_name: r.get("display_name"),
            joined_at: r.get("joined_at"),
        })
        .collect())
}
